use cascade_expr::builder::TreeBuilder;
use cascade_expr::{ColSet, Expr, GroupID, Operator, Private};
use cascade_plan::error::Error;
use cascade_plan::explain::Explain;
use cascade_plan::rule::decorrelate;
use cascade_plan::{Memo, SearchOptions};
use cascade_tests::{init_logger, optimize, project_cols, tpch_catalog};

fn fingerprints(memo: &Memo, group: GroupID) -> Vec<String> {
    memo.group_exprs(group)
        .unwrap()
        .iter()
        .map(|me| me.fingerprint().to_string())
        .collect()
}

/// Group of the input of the root projection.
fn proj_input(memo: &Memo) -> GroupID {
    let root = memo.root().unwrap();
    memo.group_exprs(root).unwrap()[0].children[0].unwrap()
}

/// select <cols> from lineitem join orders on l_orderkey = o_orderkey
fn lineitem_orders(cols: &[(&str, &str)]) -> Expr {
    let mut b = TreeBuilder::new(tpch_catalog());
    let l = b.scan("lineitem").unwrap();
    let o = b.scan("orders").unwrap();
    let join = Expr::inner_join(
        l,
        o,
        vec![Expr::cmp_eq(
            b.col("lineitem", "l_orderkey").unwrap(),
            b.col("orders", "o_orderkey").unwrap(),
        )],
    )
    .unwrap();
    let proj = project_cols(&b, join, cols);
    b.finish(proj).unwrap()
}

/// select c_name from customer where [not] exists (
///   select 1 from orders where o_custkey = c_custkey)
fn customer_with_orders(negated: bool) -> Expr {
    let mut b = TreeBuilder::new(tpch_catalog());
    let c = b.scan("customer").unwrap();
    let o = b.scan("orders").unwrap();
    let cond = Expr::cmp_eq(
        b.col("orders", "o_custkey").unwrap(),
        b.col("customer", "c_custkey").unwrap(),
    );
    let subq = Expr::select(o, vec![cond]).unwrap();
    let one = b.new_col();
    let subq = Expr::project(subq, vec![Expr::i64(1)], vec![one]).unwrap();
    let pred = if negated {
        Expr::not_exists(subq)
    } else {
        Expr::exists(subq)
    };
    let sel = Expr::select(c, vec![pred]).unwrap();
    let proj = project_cols(&b, sel, &[("customer", "c_name")]);
    b.finish(proj).unwrap()
}

/// select <col> from customer where <filter_col> = '...'
fn customer_by(col: &str, filter_col: &str) -> Expr {
    let mut b = TreeBuilder::new(tpch_catalog());
    let c = b.scan("customer").unwrap();
    let f = Expr::cmp_eq(
        b.col("customer", filter_col).unwrap(),
        Expr::string("25-989-741-2988"),
    );
    let sel = Expr::select(c, vec![f]).unwrap();
    let proj = project_cols(&b, sel, &[("customer", col)]);
    b.finish(proj).unwrap()
}

#[test]
fn test_join_elim_lineitem_orders() {
    init_logger();
    let root = lineitem_orders(&[("lineitem", "l_quantity")]);
    let (memo, stats) = optimize(root, SearchOptions::default()).unwrap();
    println!("Memo:\n{}", memo.explain_string());
    assert!(!stats.exhausted);
    let join = proj_input(&memo);
    let fps = fingerprints(&memo, join);
    // l_orderkey is part of primary key and never null, no guard
    assert!(fps.iter().any(|f| f == "scan lineitem"), "{:?}", fps);
    assert!(fps.iter().any(|f| f == "inner join [2 1 5]"), "{:?}", fps);
    assert!(!fps.iter().any(|f| f.starts_with("select")));
}

#[test]
fn test_join_elim_keeps_referencing_side() {
    init_logger();
    // o_orderdate is read above the join
    let root = lineitem_orders(&[("lineitem", "l_quantity"), ("orders", "o_orderdate")]);
    let (memo, _) = optimize(root, SearchOptions::default()).unwrap();
    let join = proj_input(&memo);
    assert!(memo
        .group_exprs(join)
        .unwrap()
        .iter()
        .all(|me| me.op == Operator::InnerJoin));

    // orders is the referencing side and lineitem is not referenced
    let mut b = TreeBuilder::new(tpch_catalog());
    let o = b.scan("orders").unwrap();
    let l = b.scan("lineitem").unwrap();
    let join = Expr::inner_join(
        o,
        l,
        vec![Expr::cmp_eq(
            b.col("orders", "o_orderkey").unwrap(),
            b.col("lineitem", "l_orderkey").unwrap(),
        )],
    )
    .unwrap();
    let proj = project_cols(&b, join, &[("lineitem", "l_quantity")]);
    let root = b.finish(proj).unwrap();
    let (memo, _) = optimize(root, SearchOptions::default()).unwrap();
    let join = proj_input(&memo);
    let fps = fingerprints(&memo, join);
    // lineitem is kept and orders dropped, whatever the join order
    assert!(fps.iter().any(|f| f == "scan lineitem"), "{:?}", fps);
    assert!(!fps.iter().any(|f| f == "scan orders"));
}

#[test]
fn test_exists_to_semi_join_in_search() {
    init_logger();
    let root = customer_with_orders(false);
    let (memo, stats) = optimize(root, SearchOptions::default()).unwrap();
    println!("Memo:\n{}", memo.explain_string());
    assert!(!stats.exhausted);
    let sel = proj_input(&memo);
    let alts = memo.group_exprs(sel).unwrap();
    assert!(alts.iter().any(|me| me.op == Operator::SemiJoinApply));
    let semi = alts
        .iter()
        .find(|me| me.op == Operator::SemiJoin)
        .expect("semi join");
    // the correlated predicate moved into the join condition
    assert!(semi.children[2].is_some());
    let right = semi.children[1].unwrap();
    assert_eq!(
        "scan orders",
        memo.group_exprs(right).unwrap()[0].fingerprint()
    );
}

#[test]
fn test_not_exists_to_anti_join_in_search() {
    init_logger();
    let root = customer_with_orders(true);
    let (memo, _) = optimize(root, SearchOptions::default().implement(false)).unwrap();
    let sel = proj_input(&memo);
    let alts = memo.group_exprs(sel).unwrap();
    assert!(alts.iter().any(|me| me.op == Operator::AntiJoinApply));
    assert!(alts.iter().any(|me| me.op == Operator::AntiJoin));
    assert!(!alts.iter().any(|me| me.op == Operator::SemiJoin));
}

#[test]
fn test_decorrelate_tree() {
    init_logger();
    let root = customer_with_orders(false);
    let actual = decorrelate(root).unwrap();
    assert_eq!(Operator::Project, actual.op);
    let semi = actual.input(0).unwrap();
    assert_eq!(Operator::SemiJoin, semi.op);
    assert_eq!(Operator::Scan, semi.input(0).unwrap().op);
    assert_eq!(Operator::Scan, semi.input(1).unwrap().op);
    assert_eq!(1, semi.filters().len());
    assert!(semi.rel_props().unwrap().outer_cols.is_empty());

    let root = customer_with_orders(true);
    let actual = decorrelate(root).unwrap();
    let anti = actual.input(0).unwrap();
    assert_eq!(Operator::AntiJoin, anti.op);
    assert_eq!(Operator::Scan, anti.input(1).unwrap().op);
}

#[test]
fn test_decorrelate_aggregated_subquery() {
    init_logger();
    // customer apply (select count(*) from orders where o_custkey = c_custkey)
    let mut b = TreeBuilder::new(tpch_catalog());
    let c = b.scan("customer").unwrap();
    let o = b.scan("orders").unwrap();
    let cond = Expr::cmp_eq(
        b.col("orders", "o_custkey").unwrap(),
        b.col("customer", "c_custkey").unwrap(),
    );
    let sel = Expr::select(o, vec![cond]).unwrap();
    let cnt = b.new_col();
    let agg = Expr::group_by(sel, vec![], vec![Expr::func("count", vec![])], vec![cnt]).unwrap();
    let apply = Expr::join(Operator::LeftJoinApply, c, agg, vec![]).unwrap();
    let root = b.finish(apply).unwrap();
    assert!(matches!(
        decorrelate(root),
        Err(Error::UnimplementedDecorrelation(_))
    ));
}

#[test]
fn test_covering_index_scan() {
    init_logger();
    let mut b = TreeBuilder::new(tpch_catalog());
    let c = b.scan("customer").unwrap();
    let proj = project_cols(&b, c, &[("customer", "c_phone")]);
    let root = b.finish(proj).unwrap();
    let (memo, _) = optimize(root, SearchOptions::default()).unwrap();
    let scan = proj_input(&memo);
    assert_eq!(
        vec!["scan customer", "index scan customer@1"],
        fingerprints(&memo, scan)
    );
    // index does not cover c_name
    let mut b = TreeBuilder::new(tpch_catalog());
    let c = b.scan("customer").unwrap();
    let proj = project_cols(&b, c, &[("customer", "c_name")]);
    let root = b.finish(proj).unwrap();
    let (memo, _) = optimize(root, SearchOptions::default()).unwrap();
    assert_eq!(vec!["scan customer"], fingerprints(&memo, proj_input(&memo)));
}

#[test]
fn test_select_index_scan() {
    init_logger();
    // c_custkey is covered by index on c_phone
    let (memo, _) = optimize(customer_by("c_custkey", "c_phone"), SearchOptions::default()).unwrap();
    println!("Memo:\n{}", memo.explain_string());
    let sel = proj_input(&memo);
    let alts = memo.group_exprs(sel).unwrap();
    assert!(alts.iter().any(|me| {
        me.op == Operator::Select
            && memo.group_exprs(me.children[0].unwrap()).unwrap()[0].fingerprint()
                == "index scan customer@1"
    }));

    // c_name is fetched from primary index
    let (memo, _) = optimize(customer_by("c_name", "c_phone"), SearchOptions::default()).unwrap();
    println!("Memo:\n{}", memo.explain_string());
    let sel = proj_input(&memo);
    let lookup = memo
        .group_exprs(sel)
        .unwrap()
        .iter()
        .filter(|me| me.op == Operator::Select)
        .map(|me| &memo.group_exprs(me.children[0].unwrap()).unwrap()[0])
        .find(|me| me.op == Operator::IndexLookup)
        .expect("index lookup");
    assert!(lookup.fingerprint().starts_with("index lookup customer@0"));
    let input = lookup.children[0].unwrap();
    assert_eq!(
        "index scan customer@1",
        memo.group_exprs(input).unwrap()[0].fingerprint()
    );
    // only c_name is fetched, keyed by c_custkey
    let mut b = TreeBuilder::new(tpch_catalog());
    b.scan("customer").unwrap();
    let custkey = b.col_index("customer", "c_custkey").unwrap();
    let name = b.col_index("customer", "c_name").unwrap();
    let index = match &lookup.private {
        Private::Index(index) => index.clone(),
        _ => panic!("index lookup without index"),
    };
    assert_eq!(vec![custkey], index.ordering);
    assert_eq!(ColSet::from_iter([custkey, name]), index.cols);

    // no index on c_name
    let (memo, _) = optimize(customer_by("c_custkey", "c_name"), SearchOptions::default()).unwrap();
    let sel = proj_input(&memo);
    for me in memo.group_exprs(sel).unwrap() {
        let input = &memo.group_exprs(me.children[0].unwrap()).unwrap()[0];
        assert_eq!(Operator::Scan, input.op);
    }
}

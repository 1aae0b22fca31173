use cascade_catalog::mem_impl::{ColumnSpec, MemCatalogBuilder};
use cascade_catalog::types::DataType;
use cascade_catalog::{Catalog, ColumnAttr};
use cascade_expr::builder::TreeBuilder;
use cascade_expr::Expr;
use cascade_plan::error::Result;
use cascade_plan::explain::Explain;
use cascade_plan::rule::DEFAULT_RULES;
use cascade_plan::{Memo, Search, SearchOptions, SearchStats};
use std::sync::Arc;

/// Subset of TPC-H schema with primary keys, foreign keys and one
/// secondary unique key on customer.c_phone.
#[inline]
pub fn tpch_catalog() -> Arc<dyn Catalog> {
    let mut builder = MemCatalogBuilder::default();
    builder
        .add_table(
            "region",
            &[
                ColumnSpec::new("r_regionkey", DataType::I32, ColumnAttr::PK),
                ColumnSpec::new("r_name", DataType::String, ColumnAttr::NOT_NULL),
                ColumnSpec::new("r_comment", DataType::String, ColumnAttr::empty()),
            ],
        )
        .unwrap();
    builder
        .add_table(
            "nation",
            &[
                ColumnSpec::new("n_nationkey", DataType::I32, ColumnAttr::PK),
                ColumnSpec::new("n_name", DataType::String, ColumnAttr::NOT_NULL),
                ColumnSpec::new(
                    "n_regionkey",
                    DataType::I32,
                    ColumnAttr::FK | ColumnAttr::NOT_NULL,
                ),
                ColumnSpec::new("n_comment", DataType::String, ColumnAttr::empty()),
            ],
        )
        .unwrap();
    builder
        .add_table(
            "supplier",
            &[
                ColumnSpec::new("s_suppkey", DataType::I32, ColumnAttr::PK),
                ColumnSpec::new("s_name", DataType::String, ColumnAttr::NOT_NULL),
                ColumnSpec::new("s_address", DataType::String, ColumnAttr::empty()),
                ColumnSpec::new(
                    "s_nationkey",
                    DataType::I32,
                    ColumnAttr::FK | ColumnAttr::NOT_NULL,
                ),
                ColumnSpec::new("s_acctbal", DataType::Decimal, ColumnAttr::empty()),
            ],
        )
        .unwrap();
    builder
        .add_table(
            "customer",
            &[
                ColumnSpec::new("c_custkey", DataType::I32, ColumnAttr::PK),
                ColumnSpec::new("c_name", DataType::String, ColumnAttr::NOT_NULL),
                ColumnSpec::new("c_address", DataType::String, ColumnAttr::empty()),
                ColumnSpec::new(
                    "c_nationkey",
                    DataType::I32,
                    ColumnAttr::FK | ColumnAttr::NOT_NULL,
                ),
                ColumnSpec::new(
                    "c_phone",
                    DataType::String,
                    ColumnAttr::UK | ColumnAttr::NOT_NULL,
                ),
                ColumnSpec::new("c_acctbal", DataType::Decimal, ColumnAttr::empty()),
                ColumnSpec::new("c_mktsegment", DataType::String, ColumnAttr::empty()),
            ],
        )
        .unwrap();
    builder
        .add_table(
            "orders",
            &[
                ColumnSpec::new("o_orderkey", DataType::I32, ColumnAttr::PK),
                ColumnSpec::new(
                    "o_custkey",
                    DataType::I32,
                    ColumnAttr::FK | ColumnAttr::NOT_NULL,
                ),
                ColumnSpec::new("o_orderstatus", DataType::String, ColumnAttr::empty()),
                ColumnSpec::new("o_totalprice", DataType::Decimal, ColumnAttr::empty()),
                ColumnSpec::new("o_orderdate", DataType::Date, ColumnAttr::empty()),
                ColumnSpec::new("o_orderpriority", DataType::String, ColumnAttr::empty()),
            ],
        )
        .unwrap();
    builder
        .add_table(
            "lineitem",
            &[
                ColumnSpec::new(
                    "l_orderkey",
                    DataType::I32,
                    ColumnAttr::PK | ColumnAttr::FK,
                ),
                ColumnSpec::new("l_partkey", DataType::I32, ColumnAttr::empty()),
                ColumnSpec::new("l_suppkey", DataType::I32, ColumnAttr::FK),
                ColumnSpec::new("l_linenumber", DataType::I32, ColumnAttr::PK),
                ColumnSpec::new("l_quantity", DataType::Decimal, ColumnAttr::empty()),
                ColumnSpec::new("l_extendedprice", DataType::Decimal, ColumnAttr::empty()),
                ColumnSpec::new("l_discount", DataType::Decimal, ColumnAttr::empty()),
                ColumnSpec::new("l_shipdate", DataType::Date, ColumnAttr::empty()),
                ColumnSpec::new("l_commitdate", DataType::Date, ColumnAttr::empty()),
                ColumnSpec::new("l_receiptdate", DataType::Date, ColumnAttr::empty()),
            ],
        )
        .unwrap();
    builder.add_key("customer", &["c_phone"], false).unwrap();
    builder
        .add_foreign_key("nation", &["n_regionkey"], "region", &["r_regionkey"])
        .unwrap();
    builder
        .add_foreign_key("supplier", &["s_nationkey"], "nation", &["n_nationkey"])
        .unwrap();
    builder
        .add_foreign_key("customer", &["c_nationkey"], "nation", &["n_nationkey"])
        .unwrap();
    builder
        .add_foreign_key("orders", &["o_custkey"], "customer", &["c_custkey"])
        .unwrap();
    builder
        .add_foreign_key("lineitem", &["l_orderkey"], "orders", &["o_orderkey"])
        .unwrap();
    builder
        .add_foreign_key("lineitem", &["l_suppkey"], "supplier", &["s_suppkey"])
        .unwrap();
    Arc::new(builder.build())
}

/// Projects given "alias.column" pairs of scanned tables.
pub fn project_cols(b: &TreeBuilder, input: Expr, cols: &[(&str, &str)]) -> Expr {
    let items = cols.iter().map(|(t, c)| b.col(t, c).unwrap()).collect();
    let cols = cols.iter().map(|(t, c)| b.col_index(t, c).unwrap()).collect();
    Expr::project(input, items, cols).unwrap()
}

#[inline]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Inserts the tree as memo root and searches it with default rules.
pub fn optimize(root: Expr, options: SearchOptions) -> Result<(Memo, SearchStats)> {
    let mut memo = Memo::new();
    memo.insert_root(root)?;
    let stats = Search::new(&mut memo, &DEFAULT_RULES, options).run()?;
    log::debug!("memo after search:\n{}", memo.explain_string());
    Ok((memo, stats))
}

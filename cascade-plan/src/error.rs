use cascade_expr::{GroupID, MemoLoc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Root of memo already set to group {0}")]
    RootAlreadySet(GroupID),
    #[error("Root of memo not set")]
    RootNotSet,
    #[error("Invalid group {0}")]
    InvalidGroup(GroupID),
    #[error("Invalid memo location {0}")]
    InvalidMemoLoc(MemoLoc),
    #[error("Alternative would reference its own group {0}")]
    CyclicAlternative(GroupID),
    #[error("Bind location {0} does not match memo")]
    BindLocationMismatch(MemoLoc),
    #[error("Invalid pattern of rule '{0}'")]
    InvalidPattern(&'static str),
    #[error("Rule '{0}' registered twice")]
    DuplicatedRule(&'static str),
    #[error("Task {task} executed with {deps} pending dependencies")]
    NonZeroDependency { task: usize, deps: usize },
    #[error("Task {0} not found")]
    TaskNotFound(usize),
    #[error("Decorrelation of {0} is not implemented")]
    UnimplementedDecorrelation(String),
    #[error("Expression error: {0}")]
    ExprError(#[from] cascade_expr::error::Error),
}

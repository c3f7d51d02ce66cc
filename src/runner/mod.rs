//! Sequential work item execution
//!
//! `SequentialAgentRunner` owns the ordered work items of one run and
//! produces a `RunResult`; persistence lives in `crate::output`.

mod runner;
mod work_item;

pub use runner::{compose_prompt, validate_work_items, RunState, SequentialAgentRunner, CANCELLED_REASON};
pub use work_item::{aggregate, RunResult, WorkItem, WorkItemResult, WorkItemStatus};

//! The data analyst pipeline
//!
//! A question goes to the planner model, which answers with Python blocks.
//! Each block runs in the sandbox, their JSON output is merged, and the
//! assembler model turns the merged results into the final answer.

mod analyst;
mod answer;
mod error;
mod plan;
mod prompts;

pub use analyst::Analyst;
pub use answer::FinalAnswer;
pub use error::AgentError;
pub use plan::{extract_json_object, merge_output, parse_json_value, Plan, PythonBlock};
pub use prompts::{chdir_prelude, planner_user, ASSEMBLER_SYSTEM, PLANNER_SYSTEM};

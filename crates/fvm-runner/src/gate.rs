//! Run gate: turns sealed step results into one exit code.

use crate::result::{DesignResults, StepStatus};
use fvm_core::FailureClass;
use serde::{Deserialize, Serialize};

/// Gate evaluation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the run succeeded.
    pub passed: bool,

    /// Process exit code.
    pub exit_code: i32,

    /// Step failures and logged errors that count against the run.
    pub violations: Vec<String>,

    /// Summary message.
    pub message: String,
}

pub struct RunGate;

impl RunGate {
    /// Evaluate a finished run.
    ///
    /// Precedence:
    /// - interrupted (7)
    /// - the first non-allowed step failure in step order (4 or 5)
    /// - a bad value raised while the run was in progress (3)
    /// - any error logged during the run (6)
    pub fn evaluate(designs: &[DesignResults], cancelled: bool, logged_errors: u64) -> GateVerdict {
        let mut violations = Vec::new();
        let mut first_tool_failure = None;
        let mut bad_value = false;

        for design in designs {
            for step in design.steps.iter().filter(|s| s.is_blocking()) {
                let class = step.failure_class.unwrap_or(FailureClass::ToolError);
                violations.push(format!(
                    "{}.{} {} ({})",
                    design.key,
                    step.step,
                    step.status,
                    class
                ));
                match class {
                    FailureClass::ToolError | FailureClass::GoalNotMet => {
                        first_tool_failure.get_or_insert(class);
                    }
                    FailureClass::BadValue => bad_value = true,
                    _ => {}
                }
            }
        }
        if logged_errors > 0 {
            violations.push(format!("{logged_errors} error(s) logged during the run"));
        }

        let class = if cancelled {
            Some(FailureClass::Interrupted)
        } else if let Some(class) = first_tool_failure {
            Some(class)
        } else if bad_value {
            Some(FailureClass::BadValue)
        } else if logged_errors > 0 {
            Some(FailureClass::CheckFailed)
        } else {
            None
        };

        let exit_code = class.map_or(0, FailureClass::exit_code);
        let message = match class {
            None => {
                let executed = designs
                    .iter()
                    .flat_map(|d| &d.steps)
                    .filter(|s| s.status == StepStatus::Pass)
                    .count();
                format!("All {executed} executed step(s) passed")
            }
            Some(class) => format!(
                "Run failed ({class}) with {} violation(s)",
                violations.len()
            ),
        };

        GateVerdict {
            passed: class.is_none(),
            exit_code,
            violations,
            message,
        }
    }
}

//! Identifier generation (C12).

use uuid::Uuid;

pub fn new_error_id() -> String {
    format!("err-{}", Uuid::new_v4())
}

pub fn new_solution_id() -> String {
    format!("sol-{}", Uuid::new_v4())
}

pub fn new_session_id() -> String {
    format!("sess-{}", Uuid::new_v4())
}

pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

//! EYG - an abstract machine for a small functional language with
//! resumable algebraic effects

pub mod ast;
pub mod builtins;
pub mod config;
pub mod driver;
pub mod effects;
pub mod env;
pub mod errors;
pub mod ir;
pub mod machine;
pub mod stack;
pub mod suite;
pub mod test_support;
pub mod value;

pub use ast::{Expr, Label};
pub use builtins::{Builtin, Op};
pub use config::{MachineConfig, ResumePolicy};
pub use driver::{run, run_with_config, Extrinsics};
pub use env::Env;
pub use errors::{find_similar, levenshtein_distance, Failure, MachineError};
pub use machine::{eval, step, Break, Machine, State, Step};
pub use value::Value;

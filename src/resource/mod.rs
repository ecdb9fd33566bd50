//! Declarative resource engine.
//!
//! Configuration text is tokenized into logical lines, parsed into a facts
//! tree by a rule table, compared with desired state by the structural
//! differ, and the resulting plan is rendered back into device commands.
//! Each network resource supplies one [`Grammar`]; everything in this module
//! is generic over it.

pub mod differ;
pub mod grammar;
pub mod parser;
pub mod plan;
pub mod renderer;
pub mod tokenizer;
pub mod tree;

pub use differ::{diff, Policy};
pub use grammar::{canonicalize, negate, FieldRule, Grammar, Level, ResourceModel, Scope};
pub use parser::{Coerce, Parser, Rule};
pub use plan::{apply, Change, ChangeKind, DiffPlan, EntityDiff, FieldChange};
pub use renderer::render;
pub use tokenizer::{tokenize, Continuation, Line, Tokenizer};
pub use tree::{NaturalKey, SetKind, Tree};

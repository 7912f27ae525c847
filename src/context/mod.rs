//! Question classification and transcript context selection

pub mod classifier;
pub mod fast_path;
pub mod selector;

pub use classifier::{Intent, QuestionClassifier};
pub use fast_path::{excerpt_around, just_said_answer};
pub use selector::{ContextSelection, ContextSelector, SelectionStrategy, SelectorConfig, TITLE_PREFIX};

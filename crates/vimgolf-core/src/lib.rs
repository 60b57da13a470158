pub mod buffer;
pub mod cursor;
pub mod editor;
pub mod ex;
pub mod mode;
pub mod motion;
pub mod normal;
pub mod operator;
pub mod options;
pub mod pattern;
pub mod register;
pub mod search;
pub mod text_object;
pub mod token;

pub use buffer::Buffer;
pub use cursor::Cursor;
pub use editor::{
    create_initial_state, create_initial_state_with_options, execute_keystroke, EditorState,
    Engine, ShellRunner,
};
pub use mode::Mode;
pub use motion::{Motion, Span};
pub use operator::{Operator, PendingOperator};
pub use options::Options;
pub use register::{Register, RegisterManager};
pub use search::{SearchDirection, SearchState};
pub use text_object::ObjectScope;
pub use token::{count_keystrokes, extract_keystroke, normalize_text, tokenize_keystrokes};

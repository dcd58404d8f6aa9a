pub mod icons;
pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    banner, dim, error, header, section, status, success, table_failed, table_loaded,
    table_unchanged, warn,
};
pub use progress::{ProgressManager, Spinner};
pub use progress_message::ProgressMessage;
pub use table::{rows_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};

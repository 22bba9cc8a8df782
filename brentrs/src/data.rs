pub mod reader;
pub mod sentiment;
pub mod sheet;
pub mod table;
pub mod unify;

pub use reader::read_workbook;
pub use sentiment::aggregate_sentiment;
pub use sheet::{Cell, RawSheet};
pub use table::{Column, Table};
pub use unify::{unify, DATE_COLUMN};

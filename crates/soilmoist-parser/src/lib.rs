pub mod errors;
pub mod model;
pub mod reader;
pub mod values;

pub use errors::ParserError;
pub use model::{
    DataFrequency, FilenameMetadata, FilenameTokens, LoggerFile, PlantingTime, RawFileSummary,
    RawTable, TokenRule, UnitsHeader,
};
pub use reader::{
    merge_logger_files, parse_logger_file, read_logger_file, read_site_files, ReadOptions,
    SOURCE_FILE_COLUMN,
};

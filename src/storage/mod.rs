pub mod upload;

pub use upload::{IncomingFile, UploadReport, UploadStore, UploadedFile};

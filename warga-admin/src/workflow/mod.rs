//! Workflows over the document store
//!
//! Every operation validates first and resolves to success or exactly one
//! [`warga_common::Error`].

pub mod families;
pub mod stats;
pub mod transfer;

pub use families::{CreatedFamily, FamilyFeed, FamilyService};
pub use stats::WargaStats;
pub use transfer::{
    DirectorySink, FailedGroup, FileSink, ImportReport, SheetFile, SkippedGroup, SkippedRow,
    TransferService,
};

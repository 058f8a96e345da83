use clap::ValueEnum;
use cloud_format::{ExportFormat, ZAxis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum FileFormat {
    #[value(name = "pcd")]
    Pcd,
    #[value(name = "pcd.ascii")]
    PcdAscii,
    #[value(name = "ply")]
    Ply,
    #[value(name = "bin")]
    RawBin,
}

impl From<FileFormat> for ExportFormat {
    fn from(format: FileFormat) -> Self {
        match format {
            FileFormat::Pcd => ExportFormat::Pcd,
            FileFormat::PcdAscii => ExportFormat::PcdAscii,
            FileFormat::Ply => ExportFormat::Ply,
            FileFormat::RawBin => ExportFormat::RawBin,
        }
    }
}

/// Layout of recorded messages on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum SourceFormat {
    /// A directory with one wire record per file.
    #[value(name = "dir")]
    Directory,
    /// A single file of length-prefixed wire records.
    #[value(name = "stream")]
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ZAxisArg {
    Sensor,
    Index,
}

impl From<ZAxisArg> for ZAxis {
    fn from(axis: ZAxisArg) -> Self {
        match axis {
            ZAxisArg::Sensor => ZAxis::Sensor,
            ZAxisArg::Index => ZAxis::ScaledIndex,
        }
    }
}

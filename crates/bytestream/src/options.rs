use std::fmt;
use std::str::FromStr;

use bytestream_error::{ErrorKind, StreamError};
use serde::{Deserialize, Serialize};

/// How reads contribute to a stream's byte total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteCounting {
    /// Only reads that filled the entire requested length are counted. A read
    /// cut short by end of file contributes nothing.
    #[default]
    CompletedReads,
    /// Every delivered byte is counted.
    AllDelivered,
}

impl ByteCounting {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CompletedReads => "completed_reads",
            Self::AllDelivered => "all_delivered",
        }
    }
}

impl fmt::Display for ByteCounting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ByteCounting {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed_reads" => Ok(Self::CompletedReads),
            "all_delivered" => Ok(Self::AllDelivered),
            other => Err(StreamError::with_kind(
                ErrorKind::InvalidInput,
                format!("Unknown byte counting mode '{other}'"),
            )
            .with_field("expected", "completed_reads, all_delivered")),
        }
    }
}

/// Options applied to every stream created with them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ByteStreamOptions {
    pub byte_counting: ByteCounting,
}

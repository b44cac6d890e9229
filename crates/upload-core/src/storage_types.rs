use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Built-in storage backends.
///
/// The string form is the adapter key used in the mime routing table.
/// Additional backends can be registered under any other key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StorageBackend {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "aws-s3")]
    S3,
    #[serde(rename = "gcs")]
    Gcs,
    #[serde(rename = "imgur")]
    Imgur,
    #[serde(rename = "qiniu")]
    Qiniu,
}

impl StorageBackend {
    pub const ALL: [StorageBackend; 5] = [
        StorageBackend::Local,
        StorageBackend::S3,
        StorageBackend::Gcs,
        StorageBackend::Imgur,
        StorageBackend::Qiniu,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StorageBackend::Local => "local",
            StorageBackend::S3 => "aws-s3",
            StorageBackend::Gcs => "gcs",
            StorageBackend::Imgur => "imgur",
            StorageBackend::Qiniu => "qiniu",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "aws-s3" | "s3" => Ok(StorageBackend::S3),
            "gcs" => Ok(StorageBackend::Gcs),
            "imgur" => Ok(StorageBackend::Imgur),
            "qiniu" => Ok(StorageBackend::Qiniu),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trips_through_from_str() {
        for backend in StorageBackend::ALL {
            assert_eq!(backend.key().parse::<StorageBackend>().unwrap(), backend);
        }
        assert_eq!("S3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert!("nfs".parse::<StorageBackend>().is_err());
    }
}

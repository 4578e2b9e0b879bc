use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

/// Placement of pipeline weights: a specific accelerator or the host CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeviceMap {
    ForceCpu,
    Ordinal(usize),
}

impl Default for DeviceMap {
    fn default() -> Self {
        Self::Ordinal(0)
    }
}

impl fmt::Display for DeviceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForceCpu => write!(f, "cpu"),
            Self::Ordinal(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

impl FromStr for DeviceMap {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Self::ForceCpu),
            "cuda" => Ok(Self::Ordinal(0)),
            other => {
                let ordinal = other
                    .strip_prefix("cuda:")
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| anyhow!("unrecognized device {other:?}"))?;
                Ok(Self::Ordinal(ordinal))
            }
        }
    }
}

serde_plain::derive_serialize_from_display!(DeviceMap);
serde_plain::derive_deserialize_from_fromstr!(DeviceMap, "device identifier such as `cpu` or `cuda:0`");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_accelerator() {
        assert_eq!(DeviceMap::default(), DeviceMap::Ordinal(0));
    }

    #[test]
    fn displays_device_names() {
        assert_eq!(DeviceMap::ForceCpu.to_string(), "cpu");
        assert_eq!(DeviceMap::Ordinal(1).to_string(), "cuda:1");
    }

    #[test]
    fn parses_device_names() {
        assert_eq!("cpu".parse::<DeviceMap>().unwrap(), DeviceMap::ForceCpu);
        assert_eq!("cuda".parse::<DeviceMap>().unwrap(), DeviceMap::Ordinal(0));
        assert_eq!("cuda:3".parse::<DeviceMap>().unwrap(), DeviceMap::Ordinal(3));
        assert!("tpu".parse::<DeviceMap>().is_err());
        assert!("cuda:x".parse::<DeviceMap>().is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        assert_eq!(serde_plain::to_string(&DeviceMap::Ordinal(2)).unwrap(), "cuda:2");
    }
}

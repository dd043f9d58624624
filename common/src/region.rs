use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A spectating region. Values only exist as entries of [`REGIONS`].
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub code: &'static str,
    pub spectator_host: &'static str,
    pub spectator_port: u16,
    /// Platform id used in spectator paths, e.g. `EUW1`
    pub spectator_platform_id: &'static str,
    /// Platform id used by the platform REST API, e.g. `euw`
    pub transport_platform_id: &'static str,
}

pub const REGIONS: [Region; 10] = [
    Region {
        code: "NA",
        spectator_host: "spectator.na.lol.riotgames.com",
        spectator_port: 80,
        spectator_platform_id: "NA1",
        transport_platform_id: "na",
    },
    Region {
        code: "EUW",
        spectator_host: "spectator.euw1.lol.riotgames.com",
        spectator_port: 80,
        spectator_platform_id: "EUW1",
        transport_platform_id: "euw",
    },
    Region {
        code: "EUNE",
        spectator_host: "spectator.eu.lol.riotgames.com",
        spectator_port: 8088,
        spectator_platform_id: "EUN1",
        transport_platform_id: "eune",
    },
    Region {
        code: "KR",
        spectator_host: "spectator.kr.lol.riotgames.com",
        spectator_port: 80,
        spectator_platform_id: "KR",
        transport_platform_id: "kr",
    },
    Region {
        code: "OCE",
        spectator_host: "spectator.oc1.lol.riotgames.com",
        spectator_port: 80,
        spectator_platform_id: "OC1",
        transport_platform_id: "oce",
    },
    Region {
        code: "BR",
        spectator_host: "spectator.br.lol.riotgames.com",
        spectator_port: 80,
        spectator_platform_id: "BR1",
        transport_platform_id: "br",
    },
    Region {
        code: "LAN",
        spectator_host: "spectator.la1.lol.riotgames.com",
        spectator_port: 80,
        spectator_platform_id: "LA1",
        transport_platform_id: "lan",
    },
    Region {
        code: "LAS",
        spectator_host: "spectator.la2.lol.riotgames.com",
        spectator_port: 80,
        spectator_platform_id: "LA2",
        transport_platform_id: "las",
    },
    Region {
        code: "RU",
        spectator_host: "spectator.ru.lol.riotgames.com",
        spectator_port: 80,
        spectator_platform_id: "RU",
        transport_platform_id: "ru",
    },
    Region {
        code: "TR",
        spectator_host: "spectator.tr.lol.riotgames.com",
        spectator_port: 80,
        spectator_platform_id: "TR1",
        transport_platform_id: "tr",
    },
];

impl Region {
    pub fn all() -> &'static [Region] {
        &REGIONS
    }

    /// Look up a region by code or either platform id spelling, ignoring case.
    pub fn lookup(id: &str) -> Option<Region> {
        let id = id.trim();
        REGIONS.iter().copied().find(|r| {
            r.code.eq_ignore_ascii_case(id)
                || r.spectator_platform_id.eq_ignore_ascii_case(id)
                || r.transport_platform_id.eq_ignore_ascii_case(id)
        })
    }

    /// Base URL of the region's spectator host
    pub fn spectator_base_url(&self) -> String {
        format!("http://{}:{}", self.spectator_host, self.spectator_port)
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Region {}

impl std::hash::Hash for Region {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::lookup(s).ok_or_else(|| anyhow!("Unknown region: {}", s))
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code)
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Region::lookup(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown region `{}`", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_any_spelling() {
        let by_code = Region::lookup("euw").unwrap();
        let by_spectator = Region::lookup("EUW1").unwrap();
        let by_mixed_case = Region::lookup("eUn1").unwrap();

        assert_eq!(by_code, by_spectator);
        assert_eq!(by_code.spectator_platform_id, "EUW1");
        assert_eq!(by_mixed_case.code, "EUNE");
        assert_eq!(by_mixed_case.spectator_port, 8088);
        assert!(Region::lookup("moon").is_none());
    }

    #[test]
    fn test_region_serde_uses_code() {
        let region = Region::lookup("KR").unwrap();
        let json = serde_json::to_string(&region).unwrap();
        assert_eq!(json, "\"KR\"");

        let back: Region = serde_json::from_str("\"kr\"").unwrap();
        assert_eq!(back, region);
        assert!(serde_json::from_str::<Region>("\"XX\"").is_err());
    }

    #[test]
    fn test_codes_and_ids_are_unique() {
        for (i, a) in REGIONS.iter().enumerate() {
            for b in REGIONS.iter().skip(i + 1) {
                assert_ne!(a.code, b.code);
                assert_ne!(a.spectator_platform_id, b.spectator_platform_id);
                assert_ne!(a.transport_platform_id, b.transport_platform_id);
            }
        }
    }
}

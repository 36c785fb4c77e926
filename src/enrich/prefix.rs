//! Callsign prefix resolver
//!
//! Airline callsigns start with the operator's three-letter ICAO designator
//! (`RYR4421` -> `RYR`). This is the fallback operator source when the
//! aircraft index has no entry for a hex.

use std::collections::HashMap;

/// ICAO airline designator -> operator name
///
/// Covers the carriers most commonly seen in European and North American
/// airspace.
pub const AIRLINE_PREFIXES: &[(&str, &str)] = &[
    ("AAL", "AMERICAN AIRLINES"),
    ("AAR", "ASIANA"),
    ("ACA", "AIR CANADA"),
    ("AFR", "AIR FRANCE"),
    ("AIC", "AIR INDIA"),
    ("AMX", "AEROMEXICO"),
    ("ANA", "ALL NIPPON AIRWAYS"),
    ("ASA", "ALASKA AIRLINES"),
    ("AUA", "AUSTRIAN"),
    ("AUI", "UKRAINE INTL"),
    ("AZA", "ALITALIA"),
    ("BAW", "BRITISH AIRWAYS"),
    ("BCS", "EUROPEAN AIR CHARTER"),
    ("BEE", "BEE LINE"),
    ("BEL", "BRUSSELS AIRLINES"),
    ("BER", "GERMANIA"),
    ("BOX", "AEROLOGIC"),
    ("CAL", "CHINA AIRLINES"),
    ("CCA", "AIR CHINA"),
    ("CES", "CHINA EASTERN"),
    ("CFG", "CONDOR"),
    ("CLH", "LUFTHANSA CARGO"),
    ("CPA", "CATHAY PACIFIC"),
    ("CSN", "CHINA SOUTHERN"),
    ("CTN", "CROATIA AIRLINES"),
    ("CXA", "XIAMEN AIR"),
    ("DAL", "DELTA"),
    ("DLH", "LUFTHANSA"),
    ("EAL", "EASTERN AIRWAYS"),
    ("EDW", "EDELWEISS AIR"),
    ("EIN", "AER LINGUS"),
    ("EJU", "EASYJET EUROPE"),
    ("ELY", "EL AL"),
    ("ETD", "ETIHAD"),
    ("ETH", "ETHIOPIAN"),
    ("EVA", "EVA AIR"),
    ("EWG", "EUROWINGS"),
    ("EXS", "JET2"),
    ("EZE", "EASYJET EUROPE"),
    ("EZS", "EASYJET SWITZERLAND"),
    ("EZY", "EASYJET"),
    ("FDB", "FLYDUBAI"),
    ("FDX", "FEDEX"),
    ("FIN", "FINNAIR"),
    ("GEC", "LUFTHANSA CARGO"),
    ("GIA", "GARUDA"),
    ("GTI", "ATLAS AIR"),
    ("GWI", "GERMANWINGS"),
    ("HAL", "HAWAIIAN"),
    ("HVN", "VIETNAM AIRLINES"),
    ("IBE", "IBERIA"),
    ("IBK", "NORWEGIAN"),
    ("ICE", "ICELANDAIR"),
    ("JAL", "JAPAN AIRLINES"),
    ("JBU", "JETBLUE"),
    ("KAL", "KOREAN AIR"),
    ("KLM", "KLM"),
    ("KQA", "KENYA AIRWAYS"),
    ("LAN", "LATAM CHILE"),
    ("LOG", "LOGANAIR"),
    ("LOT", "LOT POLISH"),
    ("LZB", "WIZZ AIR"),
    ("MAH", "MALEV"),
    ("MAS", "MALAYSIA AIRLINES"),
    ("MSR", "EGYPTAIR"),
    ("NAX", "NORWEGIAN"),
    ("NKS", "SPIRIT AIRLINES"),
    ("NOZ", "NORWEGIAN AIR"),
    ("NPT", "WEST ATLANTIC"),
    ("OAL", "OLYMPIC"),
    ("PAC", "POLAR AIR CARGO"),
    ("PGT", "PEGASUS"),
    ("PIA", "PIA"),
    ("QFA", "QANTAS"),
    ("QTR", "QATAR AIRWAYS"),
    ("RAM", "ROYAL AIR MAROC"),
    ("ROT", "TAROM"),
    ("RYR", "RYANAIR"),
    ("RZO", "SAUDIA"),
    ("SAA", "SOUTH AFRICAN"),
    ("SAS", "SAS"),
    ("SIA", "SINGAPORE AIRLINES"),
    ("SKW", "SKYWEST"),
    ("SLK", "SILK AIR"),
    ("SQC", "SINGAPORE CARGO"),
    ("SWA", "SOUTHWEST"),
    ("SWR", "SWISS"),
    ("TAM", "LATAM BRASIL"),
    ("TAP", "TAP PORTUGAL"),
    ("THA", "THAI"),
    ("THY", "TURKISH AIRLINES"),
    ("TOM", "TUI"),
    ("TSC", "AIR TRANSAT"),
    ("TUI", "TUI FLY"),
    ("TVF", "TRANSAVIA FRANCE"),
    ("UAE", "EMIRATES"),
    ("UAL", "UNITED"),
    ("UPS", "UPS"),
    ("UZB", "UZBEKISTAN AIRWAYS"),
    ("VIR", "VIRGIN ATLANTIC"),
    ("VLG", "VUELING"),
    ("VOE", "VOLOTEA"),
    ("VOI", "VOLARIS"),
    ("VTG", "VOLGA-DNEPR"),
    ("WJA", "WESTJET"),
    ("WUK", "WIZZ AIR UK"),
    ("WZZ", "WIZZ AIR"),
];

/// Pure in-memory prefix -> operator lookup
#[derive(Debug, Clone)]
pub struct CallsignPrefixResolver {
    operators: HashMap<&'static str, &'static str>,
}

impl CallsignPrefixResolver {
    pub fn new() -> Self {
        Self {
            operators: AIRLINE_PREFIXES.iter().copied().collect(),
        }
    }

    /// Operator for the airline prefix of `callsign`
    ///
    /// The callsign must be at least four characters long and its first three
    /// characters must be letters.
    pub fn resolve(&self, callsign: &str) -> Option<&'static str> {
        let prefix = Self::prefix(callsign)?;
        self.operators.get(prefix.as_str()).copied()
    }

    /// Upper-cased ICAO prefix of a callsign, if it has one
    pub fn prefix(callsign: &str) -> Option<String> {
        let callsign = callsign.trim();
        if callsign.chars().count() < 4 {
            return None;
        }
        let prefix: String = callsign.chars().take(3).collect();
        if !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(prefix.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl Default for CallsignPrefixResolver {
    fn default() -> Self {
        Self::new()
    }
}

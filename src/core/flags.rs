use serde::{Deserialize, Serialize};

/// Engine version tag embedded in every emitted edge and shadow record.
/// Consumers reject writes whose snapshot id differs from their expected version.
pub const CURRENT_SNAPSHOT_ID: i64 = 202602235;

/// Heuristic signal taxonomy. The numeric bit positions are part of the
/// external contract (persisted masks, downstream consumers) and are frozen.
///
/// Layers:
///   0-3   deterministic facts (ledger-observable)
///   10-19 probabilistic signals (inference)
///   20-24 policy-gated hypotheses (brittle by design, used for gating)
///   25-29 forensic intelligence (active threat signals)
///   30-33 deep intelligence (behavioral profiling)
///   34-36 operational intelligence (entity resolution & risk)
///   37-39 next-gen threat intelligence (infrastructure analysis)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HeuristicFlag {
    SegWit = 0,
    Taproot = 1,
    SchnorrSig = 2,
    WhirlpoolStruct = 3,

    LikelyChange = 10,
    LikelyCollabConstruct = 11,
    AddressReuse = 12,
    RoundPayment = 13,
    Consolidation = 14,
    Bip69 = 15,
    HighEntropy = 16,
    SuspiciousFeePattern = 17,
    PeelChain = 18,
    TimingAnomaly = 19,

    MuSig2Suspect = 20,
    PayjoinSuspect = 21,
    SilentPayment = 22,
    WasabiSuspect = 23,
    JoinMarketBond = 24,

    DustAttackSuspect = 25,
    WeakMix = 26,
    HubTransaction = 27,
    DustConsolidation = 28,
    HighTraceability = 29,

    AncientUtxo = 30,
    KnownServicePattern = 31,
    Multisig = 32,
    HasOpReturn = 33,

    PostMixLeakage = 34,
    BotBehavior = 35,
    HighRisk = 36,

    LightningChannel = 37,
    IsCoinbase = 38,
    StrategicConsolidation = 39,
}

impl HeuristicFlag {
    /// Bit position of this flag in the 64-bit mask.
    pub fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

/// Strongly typed 64-bit heuristic flag mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet(pub u64);

impl FlagSet {
    pub fn empty() -> Self {
        FlagSet(0)
    }

    pub fn set(&mut self, flag: HeuristicFlag) {
        self.0 |= flag.bit();
    }

    pub fn clear(&mut self, flag: HeuristicFlag) {
        self.0 &= !flag.bit();
    }

    pub fn contains(self, flag: HeuristicFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Merge another mask into this one.
    pub fn union(&mut self, other: FlagSet) {
        self.0 |= other.0;
    }
}

impl From<u64> for FlagSet {
    fn from(bits: u64) -> Self {
        FlagSet(bits)
    }
}

/// Edge types, aligned with the persisted evidence_edge schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum EdgeType {
    Cioh = 1,
    Change = 2,
    CiohInvalidated = 3,
    CoinjoinSuspected = 4,
    PayJoinSuspect = 5,
    PeelChain = 6,
    FeeCorrelation = 7,
    DustLink = 8,
    UnmixLink = 9,
    Transitive = 10,
}

impl EdgeType {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

/// Dependency groups used to discount overlapping heuristics so correlated
/// evidence does not multiply-count in the factor graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum DependencyGroup {
    None = 0,
    ScriptHomogeneity = 1,
    ValueConstraints = 2,
    Coordination = 3,
    TemporalSignals = 4,
    FeePatterns = 5,
    Topology = 6,
}

impl DependencyGroup {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

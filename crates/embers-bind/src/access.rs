use std::{
    fmt::Display,
    ops::Index,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum AccessType {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl AccessType {
    pub fn is_none(&self) -> bool {
        *self == Self::None
    }

    pub fn reads(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn writes(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

impl Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "readwrite",
        };
        write!(f, "{s}")
    }
}

/// Selects the primal value or its derivative. Indexes [`AccessPair`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimType {
    Primal,
    Derivative,
}

impl PrimType {
    pub const ALL: [PrimType; 2] = [PrimType::Primal, PrimType::Derivative];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Primal => "primal",
            Self::Derivative => "derivative",
        }
    }
}

/// Direction of a kernel parameter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum IOType {
    #[default]
    In,
    Out,
    InOut,
}

impl Display for IOType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::In => "in",
            Self::Out => "out",
            Self::InOut => "inout",
        };
        write!(f, "{s}")
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallMode {
    #[default]
    Primal,
    Forward,
    Backward,
}

impl Display for CallMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Primal => "primal",
            Self::Forward => "forward",
            Self::Backward => "backward",
        };
        write!(f, "{s}")
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AccessPair {
    pub primal: AccessType,
    pub derivative: AccessType,
}

impl AccessPair {
    pub const NONE: Self = Self::new(AccessType::None, AccessType::None);

    pub const fn new(primal: AccessType, derivative: AccessType) -> Self {
        Self { primal, derivative }
    }

    pub fn writes(&self) -> bool {
        self.primal.writes() || self.derivative.writes()
    }
}

impl Index<PrimType> for AccessPair {
    type Output = AccessType;

    fn index(&self, prim: PrimType) -> &AccessType {
        match prim {
            PrimType::Primal => &self.primal,
            PrimType::Derivative => &self.derivative,
        }
    }
}

impl Display for AccessPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.primal, self.derivative)
    }
}

/// Storage access a bound variable needs for a call.
///
/// Primal calls don't depend on differentiability. Forward mode is not
/// supported and never accesses anything.
pub fn access_for(mode: CallMode, io: IOType, differentiable: bool) -> AccessPair {
    use AccessType::*;

    match (mode, differentiable, io) {
        (CallMode::Primal, _, IOType::In) => AccessPair::new(Read, None),
        (CallMode::Primal, _, IOType::Out) => AccessPair::new(Write, None),
        (CallMode::Primal, _, IOType::InOut) => AccessPair::new(ReadWrite, None),
        (CallMode::Backward, true, IOType::In) => AccessPair::new(Read, Write),
        (CallMode::Backward, true, IOType::Out) => AccessPair::new(None, Read),
        (CallMode::Backward, true, IOType::InOut) => AccessPair::new(Read, ReadWrite),
        (CallMode::Backward, false, IOType::In) => AccessPair::new(Read, None),
        (CallMode::Backward, false, IOType::Out) => AccessPair::NONE,
        (CallMode::Backward, false, IOType::InOut) => AccessPair::new(Read, None),
        (CallMode::Forward, _, _) => AccessPair::NONE,
    }
}

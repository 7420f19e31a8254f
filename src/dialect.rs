//! Dialect capability provider: which physical storage type represents a
//! logical type on a given database backend.
//!
//! Identifier representation genuinely differs by backend and version. The
//! canonical case is the universally-unique identifier: H2 and MySQL store
//! it as a 16-byte binary column, while PostgreSQL 9.4 and later has a
//! native uuid column type. The table is populated once at startup and is
//! read-only afterwards, so lookups need no locking.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::error::Result;

/// An abstract kind of value, independent of storage representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LogicalType(&'static str);

impl LogicalType {
    pub const UUID: LogicalType = LogicalType("universally-unique-id");

    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub fn tag(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The concrete, dialect-specific storage representation of a logical type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhysicalType(&'static str);

impl PhysicalType {
    pub const BINARY_16: PhysicalType = PhysicalType("16-byte-binary");
    pub const NATIVE_UUID: PhysicalType = PhysicalType("native-uuid-column");

    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub fn tag(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A backend version, ordered so version-gated bindings can be compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DialectVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl DialectVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for DialectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for DialectVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let mut segment = |name: &str| -> Result<u16> {
            match parts.next() {
                None => Ok(0),
                Some(raw) => raw
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidDialect(format!("bad {} version segment in `{}`", name, s))),
            }
        };
        let major = segment("major")?;
        let minor = segment("minor")?;
        let patch = segment("patch")?;
        if parts.next().is_some() {
            return Err(Error::InvalidDialect(format!("too many version segments in `{}`", s)));
        }
        Ok(Self { major, minor, patch })
    }
}

/// A named, optionally versioned, target database backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dialect {
    name:    String,
    version: Option<DialectVersion>,
}

impl Dialect {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), version: None }
    }

    pub fn versioned(name: impl Into<String>, version: DialectVersion) -> Self {
        Self { name: name.into(), version: Some(version) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<DialectVersion> {
        self.version
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}:{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for Dialect {
    type Err = Error;

    /// Parses `"PostgreSQL:9.4.0"` or a bare `"H2"`.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidDialect("empty dialect descriptor".to_string()));
        }
        match s.split_once(':') {
            None => Ok(Dialect::new(s)),
            Some((name, version)) => {
                if name.is_empty() {
                    return Err(Error::InvalidDialect(format!("missing dialect name in `{}`", s)));
                }
                Ok(Dialect::versioned(name, version.parse()?))
            }
        }
    }
}

#[derive(Clone, Debug)]
struct TypeBinding {
    logical:     LogicalType,
    dialect:     String,
    min_version: Option<DialectVersion>,
    physical:    PhysicalType,
}

/// Builder for the capability table. Registration is additive only; `build`
/// freezes the table for the life of the process.
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    bindings: Vec<TypeBinding>,
}

impl TypeRegistryBuilder {
    /// Binds `logical` for every version of `dialect`.
    pub fn bind(mut self, logical: LogicalType, dialect: impl Into<String>, physical: PhysicalType) -> Self {
        self.bindings.push(TypeBinding { logical, dialect: dialect.into(), min_version: None, physical });
        self
    }

    /// Binds `logical` for `dialect` starting at `min_version` inclusive.
    pub fn bind_from(
        mut self,
        logical: LogicalType,
        dialect: impl Into<String>,
        min_version: DialectVersion,
        physical: PhysicalType,
    ) -> Self {
        self.bindings.push(TypeBinding {
            logical,
            dialect: dialect.into(),
            min_version: Some(min_version),
            physical,
        });
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry { bindings: self.bindings }
    }
}

/// Immutable logical-to-physical type table, keyed by (logical type,
/// dialect name) with optional version gates.
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    bindings: Vec<TypeBinding>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// The stock table exercised by the identifier-interpretation suites:
    /// binary uuid storage everywhere, native uuid columns on
    /// PostgreSQL 9.4 and later.
    pub fn built_in() -> Self {
        Self::builder()
            .bind(LogicalType::UUID, "H2", PhysicalType::BINARY_16)
            .bind(LogicalType::UUID, "MySQL", PhysicalType::BINARY_16)
            .bind(LogicalType::UUID, "SQLite", PhysicalType::BINARY_16)
            .bind(LogicalType::UUID, "PostgreSQL", PhysicalType::BINARY_16)
            .bind_from(LogicalType::UUID, "PostgreSQL", DialectVersion::new(9, 4, 0), PhysicalType::NATIVE_UUID)
            .build()
    }

    /// Resolves the physical representation of `logical` on `dialect`.
    ///
    /// Lookup is exact-match on the dialect name; there is no fallback
    /// dialect. Among matching bindings, a version-gated entry applies only
    /// when the dialect's version satisfies the gate, and the highest
    /// satisfied gate wins over the ungated base entry.
    pub fn resolve(&self, logical: LogicalType, dialect: &Dialect) -> Result<PhysicalType> {
        let mut best: Option<(Option<DialectVersion>, PhysicalType)> = None;

        for binding in &self.bindings {
            if binding.logical != logical || binding.dialect != dialect.name() {
                continue;
            }
            match binding.min_version {
                None => {
                    if best.is_none() {
                        best = Some((None, binding.physical));
                    }
                }
                Some(gate) => {
                    let Some(version) = dialect.version() else { continue };
                    if version < gate {
                        continue;
                    }
                    let beats = match best {
                        Some((Some(current), _)) => gate > current,
                        _ => true,
                    };
                    if beats {
                        best = Some((Some(gate), binding.physical));
                    }
                }
            }
        }

        match best {
            Some((_, physical)) => Ok(physical),
            None => Err(Error::UnsupportedLogicalType { logical, dialect: dialect.to_string() }),
        }
    }

    /// Resolves every logical type in `required` up front, so mapping
    /// mistakes surface at validation time rather than mid-query.
    pub fn validate(&self, dialect: &Dialect, required: &[LogicalType]) -> Result<()> {
        for logical in required {
            self.resolve(*logical, dialect)?;
        }
        Ok(())
    }
}

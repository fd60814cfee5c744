//! Typed index entry values.
//!
//! Each struct here maps one to one onto a row in the corresponding index
//! table. Entries are grouped per record in [`ResourceIndices`] and flattened
//! into tagged [`IndexEntry`] values for the single batch write path.

// Index row fields mirror their persisted columns one for one
#![allow(missing_docs)]

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// A human-readable search parameter match, compared case- and
/// accent-insensitively by query builders.
#[derive(Debug, Clone, PartialEq)]
pub struct StringIndex {
    /// The search parameter name this entry belongs to.
    pub name: String,
    /// The element path the value was extracted from.
    pub path: String,
    pub value: String,
}

impl StringIndex {
    pub fn new(name: impl Into<String>, path: impl Into<String>, value: impl Into<String>) -> Self {
        StringIndex {
            name: name.into(),
            path: path.into(),
            value: value.into(),
        }
    }
}

/// A pointer at another record, stored in `Type/id` form (or as an absolute
/// URL for targets outside the store).
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceIndex {
    pub name: String,
    pub path: String,
    pub value: String,
}

impl ReferenceIndex {
    pub fn new(name: impl Into<String>, path: impl Into<String>, value: impl Into<String>) -> Self {
        ReferenceIndex {
            name: name.into(),
            path: path.into(),
            value: value.into(),
        }
    }
}

/// A coded value with an optional code system qualifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenIndex {
    pub name: String,
    pub path: String,
    pub system: Option<String>,
    pub value: String,
}

impl TokenIndex {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        system: Option<String>,
        value: impl Into<String>,
    ) -> Self {
        TokenIndex {
            name: name.into(),
            path: path.into(),
            system,
            value: value.into(),
        }
    }
}

/// A numeric measurement with optional unit and system qualifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityIndex {
    pub name: String,
    pub path: String,
    pub system: Option<String>,
    pub unit: Option<String>,
    pub value: f64,
}

impl QuantityIndex {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        system: Option<String>,
        unit: Option<String>,
        value: f64,
    ) -> Self {
        QuantityIndex {
            name: name.into(),
            path: path.into(),
            system,
            unit,
            value,
        }
    }
}

/// A canonical or literal URI value, matched exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct UriIndex {
    pub name: String,
    pub path: String,
    pub uri: String,
}

impl UriIndex {
    pub fn new(name: impl Into<String>, path: impl Into<String>, uri: impl Into<String>) -> Self {
        UriIndex {
            name: name.into(),
            path: path.into(),
            uri: uri.into(),
        }
    }
}

/// A day-precision time range, stored as a half-open interval `[from, to)`
/// in epoch milliseconds. Unbounded ends are expressed by the indexer with
/// sentinel instants.
#[derive(Debug, Clone, PartialEq)]
pub struct DateIndex {
    pub name: String,
    pub path: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateIndex {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Self {
        DateIndex {
            name: name.into(),
            path: path.into(),
            from,
            to,
        }
    }

    /// Builds the half-open range covering one whole calendar day.
    pub fn day(name: impl Into<String>, path: impl Into<String>, date: NaiveDate) -> Self {
        let from = date.and_time(NaiveTime::MIN).and_utc();
        DateIndex::new(name, path, from, from + Duration::days(1))
    }
}

/// An instant-precision time range, stored as a half-open interval
/// `[from, to)` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct DateTimeIndex {
    pub name: String,
    pub path: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateTimeIndex {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Self {
        DateTimeIndex {
            name: name.into(),
            path: path.into(),
            from,
            to,
        }
    }

    /// Builds the smallest non-empty range around a single instant:
    /// `[at, at + 1ms)` at the store's millisecond resolution.
    pub fn instant(name: impl Into<String>, path: impl Into<String>, at: DateTime<Utc>) -> Self {
        DateTimeIndex::new(name, path, at, at + Duration::milliseconds(1))
    }
}

/// A bare numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberIndex {
    pub name: String,
    pub path: String,
    pub value: f64,
}

impl NumberIndex {
    pub fn new(name: impl Into<String>, path: impl Into<String>, value: f64) -> Self {
        NumberIndex {
            name: name.into(),
            path: path.into(),
            value,
        }
    }
}

/// A geographic coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionIndex {
    pub name: String,
    pub path: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PositionIndex {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        PositionIndex {
            name: name.into(),
            path: path.into(),
            latitude,
            longitude,
        }
    }
}

/// Every index entry derived from one record, grouped by kind.
///
/// This is what a [`ResourceIndexer`](crate::ResourceIndexer) produces for a
/// payload. The store flattens it with [`into_entries`](Self::into_entries)
/// before writing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceIndices {
    pub string_indexes: Vec<StringIndex>,
    pub reference_indexes: Vec<ReferenceIndex>,
    pub token_indexes: Vec<TokenIndex>,
    pub quantity_indexes: Vec<QuantityIndex>,
    pub uri_indexes: Vec<UriIndex>,
    pub date_indexes: Vec<DateIndex>,
    pub date_time_indexes: Vec<DateTimeIndex>,
    pub number_indexes: Vec<NumberIndex>,
    pub position_indexes: Vec<PositionIndex>,
}

impl ResourceIndices {
    /// The total number of entries across all kinds.
    pub fn len(&self) -> usize {
        self.string_indexes.len()
            + self.reference_indexes.len()
            + self.token_indexes.len()
            + self.quantity_indexes.len()
            + self.uri_indexes.len()
            + self.date_indexes.len()
            + self.date_time_indexes.len()
            + self.number_indexes.len()
            + self.position_indexes.len()
    }

    /// Whether no entries were derived at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the grouped entries into tagged values for the batch writer.
    pub fn into_entries(self) -> Vec<IndexEntry> {
        let mut entries = Vec::with_capacity(self.len());
        entries.extend(self.string_indexes.into_iter().map(IndexEntry::String));
        entries.extend(self.reference_indexes.into_iter().map(IndexEntry::Reference));
        entries.extend(self.token_indexes.into_iter().map(IndexEntry::Token));
        entries.extend(self.quantity_indexes.into_iter().map(IndexEntry::Quantity));
        entries.extend(self.uri_indexes.into_iter().map(IndexEntry::Uri));
        entries.extend(self.date_indexes.into_iter().map(IndexEntry::Date));
        entries.extend(self.date_time_indexes.into_iter().map(IndexEntry::DateTime));
        entries.extend(self.number_indexes.into_iter().map(IndexEntry::Number));
        entries.extend(self.position_indexes.into_iter().map(IndexEntry::Position));
        entries
    }
}

/// A single index entry tagged with its kind.
///
/// One batch insert operation accepts any mix of these; the tag selects the
/// destination table and column binding.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEntry {
    String(StringIndex),
    Reference(ReferenceIndex),
    Token(TokenIndex),
    Quantity(QuantityIndex),
    Uri(UriIndex),
    Date(DateIndex),
    DateTime(DateTimeIndex),
    Number(NumberIndex),
    Position(PositionIndex),
}

impl IndexEntry {
    /// The kind tag of this entry.
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexEntry::String(_) => IndexKind::String,
            IndexEntry::Reference(_) => IndexKind::Reference,
            IndexEntry::Token(_) => IndexKind::Token,
            IndexEntry::Quantity(_) => IndexKind::Quantity,
            IndexEntry::Uri(_) => IndexKind::Uri,
            IndexEntry::Date(_) => IndexKind::Date,
            IndexEntry::DateTime(_) => IndexKind::DateTime,
            IndexEntry::Number(_) => IndexKind::Number,
            IndexEntry::Position(_) => IndexKind::Position,
        }
    }

    /// The search parameter name this entry belongs to.
    pub fn name(&self) -> &str {
        match self {
            IndexEntry::String(ix) => &ix.name,
            IndexEntry::Reference(ix) => &ix.name,
            IndexEntry::Token(ix) => &ix.name,
            IndexEntry::Quantity(ix) => &ix.name,
            IndexEntry::Uri(ix) => &ix.name,
            IndexEntry::Date(ix) => &ix.name,
            IndexEntry::DateTime(ix) => &ix.name,
            IndexEntry::Number(ix) => &ix.name,
            IndexEntry::Position(ix) => &ix.name,
        }
    }
}

/// The nine index entry kinds, one per index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    String,
    Reference,
    Token,
    Quantity,
    Uri,
    Date,
    DateTime,
    Number,
    Position,
}

impl IndexKind {
    /// All kinds, in a fixed order.
    pub const ALL: [IndexKind; 9] = [
        IndexKind::String,
        IndexKind::Reference,
        IndexKind::Token,
        IndexKind::Quantity,
        IndexKind::Uri,
        IndexKind::Date,
        IndexKind::DateTime,
        IndexKind::Number,
        IndexKind::Position,
    ];

    /// The table rows of this kind are stored in.
    pub fn table(&self) -> &'static str {
        match self {
            IndexKind::String => "string_indexes",
            IndexKind::Reference => "reference_indexes",
            IndexKind::Token => "token_indexes",
            IndexKind::Quantity => "quantity_indexes",
            IndexKind::Uri => "uri_indexes",
            IndexKind::Date => "date_indexes",
            IndexKind::DateTime => "date_time_indexes",
            IndexKind::Number => "number_indexes",
            IndexKind::Position => "position_indexes",
        }
    }
}

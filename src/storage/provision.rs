//! Linked-record identity store.
//!
//! One secure-element data slot holds a chain of variable-length records:
//!
//! ```text
//!  offset 0                                                 SLOT_SIZE
//!  ┌────┬─────────┬────┬──────────┬────┬──────────┬────┬──────┬────┬──────┐
//!  │hdr │"2azr\0" │hdr │ CPID\0.. │hdr │ DUID\0.. │hdr │ENV\0 │ 00 │ .... │
//!  └────┴─────────┴────┴──────────┴────┴──────────┴────┴──────┴────┴──────┘
//!    │               ▲ │              ▲                         ▲
//!    └─── next ──────┘ └──── next ────┘          EMPTY sentinel ┘
//! ```
//!
//! Each header is a little-endian `u16`: the low 9 bits are the absolute
//! offset of the next record, the high 7 bits the record type. The payload
//! fills the space up to `next`; its size is fixed when the chain is created.
//! String payloads are NUL-terminated inside that space.
//!
//! All reads and writes go to an in-memory copy of the slot. Only
//! [`RecordStore::commit`] writes back, as one bulk write.

use super::Storage;
use super::error::Error;
use crate::fmt::printable;

/// Secure element slot that holds the records.
pub const SLOT: u8 = 8;
/// Size of the slot in bytes.
pub const SLOT_SIZE: usize = 416;
/// Size of a record header.
pub const HEADER_LEN: usize = 2;

const NEXT_MASK: u16 = 0x01FF;
const TYPE_SHIFT: u16 = 9;
const MAX_NEXT: usize = NEXT_MASK as usize;
const MAX_TYPE: u8 = 0x7F;

pub const PLATFORM_CAPACITY: usize = 5;
pub const CPID_CAPACITY: usize = 66;
pub const DUID_CAPACITY: usize = 66;
pub const ENV_CAPACITY: usize = 20;

/// Records created for a device without identity data, in chain order.
const BLANK_CHAIN: [(RecordType, usize); 4] = [
    (RecordType::Platform, PLATFORM_CAPACITY),
    (RecordType::Cpid, CPID_CAPACITY),
    (RecordType::Duid, DUID_CAPACITY),
    (RecordType::Env, ENV_CAPACITY),
];

/// Record type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// Chain terminator.
    Empty,
    AwsThingName,
    AwsEndpoint,
    AzureIdScope,
    AzureIotHubName,
    AzureDeviceId,
    /// Company id.
    Cpid,
    /// Environment name.
    Env,
    /// Platform marker, also the schema version.
    Platform,
    /// Device unique id.
    Duid,
    /// Any other tag. Payload is treated as raw bytes.
    Opaque(u8),
}

impl RecordType {
    pub fn code(self) -> u8 {
        match self {
            RecordType::Empty => 0,
            RecordType::AwsThingName => 1,
            RecordType::AwsEndpoint => 2,
            RecordType::AzureIdScope => 3,
            RecordType::AzureIotHubName => 4,
            RecordType::AzureDeviceId => 5,
            RecordType::Cpid => 6,
            RecordType::Env => 7,
            RecordType::Platform => 8,
            RecordType::Duid => 9,
            RecordType::Opaque(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => RecordType::Empty,
            1 => RecordType::AwsThingName,
            2 => RecordType::AwsEndpoint,
            3 => RecordType::AzureIdScope,
            4 => RecordType::AzureIotHubName,
            5 => RecordType::AzureDeviceId,
            6 => RecordType::Cpid,
            7 => RecordType::Env,
            8 => RecordType::Platform,
            9 => RecordType::Duid,
            other => RecordType::Opaque(other),
        }
    }

    /// Whether the payload is a NUL-terminated string.
    pub fn is_string(self) -> bool {
        !matches!(self, RecordType::Empty | RecordType::Opaque(_))
    }

    fn name(self) -> &'static str {
        match self {
            RecordType::Empty => "EMPTY",
            RecordType::AwsThingName => "AWS_THINGNAME",
            RecordType::AwsEndpoint => "AWS_ENDPOINT",
            RecordType::AzureIdScope => "AZURE_ID_SCOPE",
            RecordType::AzureIotHubName => "AZURE_IOT_HUB_NAME",
            RecordType::AzureDeviceId => "AZURE_DEVICE_ID",
            RecordType::Cpid => "CPID",
            RecordType::Env => "ENV",
            RecordType::Platform => "PLATFORM",
            RecordType::Duid => "DUID",
            RecordType::Opaque(_) => "OPAQUE",
        }
    }
}

/// Cloud platform recorded in the platform marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Azure,
    Aws,
}

impl Platform {
    pub const AZURE_TAG: &'static str = "2azr";
    pub const AWS_TAG: &'static str = "2aws";
    /// Marker written by first-generation firmware. Always Azure.
    pub const LEGACY_TAG: &'static str = "v1.0";

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Azure => Self::AZURE_TAG,
            Platform::Aws => Self::AWS_TAG,
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            Self::AZURE_TAG => Some(Platform::Azure),
            Self::AWS_TAG => Some(Platform::Aws),
            _ => None,
        }
    }
}

/// What [`RecordStore::init`] found in the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// A complete identity chain was read.
    Loaded,
    /// A legacy platform marker was upgraded in the cache.
    Migrated,
    /// No identity records existed; a blank chain was appended.
    Created,
}

/// Pack a record header.
pub fn encode_header(next: usize, kind: RecordType) -> Result<[u8; HEADER_LEN], Error> {
    let code = kind.code();
    if next > MAX_NEXT || code > MAX_TYPE {
        return Err(Error::OutOfBounds);
    }
    let raw = next as u16 | (u16::from(code) << TYPE_SHIFT);
    Ok(raw.to_le_bytes())
}

/// Unpack a record header into `(next, type)`.
pub fn decode_header(bytes: [u8; HEADER_LEN]) -> (usize, RecordType) {
    let raw = u16::from_le_bytes(bytes);
    let next = (raw & NEXT_MASK) as usize;
    let code = (raw >> TYPE_SHIFT) as u8;
    (next, RecordType::from_code(code))
}

/// Location of one record in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordInfo {
    pub kind: RecordType,
    /// Offset of the header.
    pub offset: usize,
    /// Reserved payload size.
    pub capacity: usize,
}

impl RecordInfo {
    fn payload(&self) -> core::ops::Range<usize> {
        let start = self.offset + HEADER_LEN;
        start..start + self.capacity
    }
}

/// Iterator over the records before the EMPTY sentinel.
///
/// Stops early at the first header that breaks the chain.
#[derive(Debug)]
pub struct Records<'a> {
    cache: &'a [u8; SLOT_SIZE],
    offset: Option<usize>,
}

impl Iterator for Records<'_> {
    type Item = RecordInfo;

    fn next(&mut self) -> Option<RecordInfo> {
        let offset = self.offset?;
        match read_record(self.cache, offset) {
            Ok(Some(info)) => {
                self.offset = Some(info.offset + HEADER_LEN + info.capacity);
                Some(info)
            }
            _ => {
                self.offset = None;
                None
            }
        }
    }
}

/// Read the record at `offset`. `Ok(None)` for the sentinel.
fn read_record(cache: &[u8; SLOT_SIZE], offset: usize) -> Result<Option<RecordInfo>, Error> {
    if offset + HEADER_LEN > SLOT_SIZE {
        return Err(Error::OutOfBounds);
    }
    let (next, kind) = decode_header([cache[offset], cache[offset + 1]]);
    if kind == RecordType::Empty {
        return Ok(None);
    }
    // Offsets strictly increase and the following header must fit.
    if next < offset + HEADER_LEN || next + HEADER_LEN > SLOT_SIZE {
        return Err(Error::OutOfBounds);
    }
    Ok(Some(RecordInfo {
        kind,
        offset,
        capacity: next - offset - HEADER_LEN,
    }))
}

/// Result of walking the chain once.
#[derive(Debug, Default)]
struct Scan {
    /// Offset of the EMPTY sentinel.
    end: usize,
    platform: Option<RecordInfo>,
    identity_fields: usize,
    /// Bit per identity record type already seen.
    seen: u8,
    corrupt: bool,
}

/// Identity records kept in one secure-element slot.
pub struct RecordStore<S> {
    storage: S,
    cache: [u8; SLOT_SIZE],
    initialized: bool,
}

impl<S> core::fmt::Debug for RecordStore<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordStore")
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl<S: Storage> RecordStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            cache: [0; SLOT_SIZE],
            initialized: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// The cached slot image.
    pub fn as_bytes(&self) -> &[u8; SLOT_SIZE] {
        &self.cache
    }

    /// Read the slot and validate the chain.
    ///
    /// On inconsistent data the whole cache is reset to a blank Azure chain
    /// and `Err(Error::DataCorruption)` is returned. The store is usable after
    /// that; the reset reaches the hardware with the next [`commit`](Self::commit).
    pub fn init(&mut self) -> Result<LoadStatus, Error> {
        let capacity = self.storage.capacity();
        if capacity < SLOT_SIZE {
            error!("Slot {} holds {} bytes, need {}", SLOT, capacity, SLOT_SIZE);
            return Err(Error::CapacityTooSmall);
        }
        if capacity > SLOT_SIZE {
            warn!("Slot {} holds {} bytes, using the first {}", SLOT, capacity, SLOT_SIZE);
        }

        self.storage.read(0, &mut self.cache).map_err(|_| {
            error!("Failed to read slot {}", SLOT);
            Error::ReadError
        })?;
        self.initialized = true;

        if self.cache.iter().all(|&b| b == 0xFF) {
            info!("Slot {} is erased, creating identity records", SLOT);
            self.reset()?;
            return Ok(LoadStatus::Created);
        }

        let scan = self.scan();
        if scan.corrupt {
            return self.recover("broken record chain");
        }

        let Some(platform) = scan.platform else {
            if scan.identity_fields > 0 {
                return self.recover("identity records without platform marker");
            }
            info!("No identity records found, appending blank records");
            if self.write_blank_chain(scan.end).is_err() {
                return self.recover("no room for identity records");
            }
            return Ok(LoadStatus::Created);
        };

        if scan.identity_fields != BLANK_CHAIN.len() - 1 {
            return self.recover("unexpected number of identity records");
        }

        let tag = self.string_at(&platform).unwrap_or("");
        if tag == Platform::LEGACY_TAG {
            info!("Migrating platform marker {} to {}", tag, Platform::AZURE_TAG);
            self.write_string(&platform, Platform::AZURE_TAG)?;
            return Ok(LoadStatus::Migrated);
        }
        if Platform::from_tag(tag).is_none() {
            return self.recover("unknown platform marker");
        }

        Ok(LoadStatus::Loaded)
    }

    /// Iterate over all records.
    pub fn records(&self) -> Records<'_> {
        Records {
            cache: &self.cache,
            offset: self.initialized.then_some(0),
        }
    }

    /// Borrow a string record from the cache.
    ///
    /// The reference is invalidated by the next mutation.
    pub fn get(&self, kind: RecordType) -> Result<&str, Error> {
        let record = self.find(kind)?;
        if !kind.is_string() {
            return Err(Error::BadParam);
        }
        if kind == RecordType::Platform {
            warn!("Reading the platform record directly, use platform()");
        }
        self.string_at(&record)
    }

    /// Copy a record into `out`, returning the value length.
    ///
    /// Every record is copied followed by a NUL terminator, which is not
    /// counted in the returned length, so `out` needs one spare byte. Opaque
    /// payloads may contain NUL bytes themselves; for them only the returned
    /// length marks the end.
    pub fn copy(&self, kind: RecordType, out: &mut [u8]) -> Result<usize, Error> {
        let record = self.find(kind)?;
        if kind.is_string() {
            let value = self.string_at(&record)?;
            if value.len() + 1 > out.len() {
                return Err(Error::BufferTooSmall);
            }
            out[..value.len()].copy_from_slice(value.as_bytes());
            out[value.len()] = 0;
            Ok(value.len())
        } else {
            let payload = &self.cache[record.payload()];
            if payload.len() + 1 > out.len() {
                error!("No room to copy {} bytes and terminator", payload.len());
                return Err(Error::BufferTooSmall);
            }
            out[..payload.len()].copy_from_slice(payload);
            out[payload.len()] = 0;
            Ok(payload.len())
        }
    }

    /// Store a string value in the cache.
    ///
    /// Fails with `ValueTooLarge` if the value and its terminator exceed the
    /// record's reserved space; the record is left untouched.
    pub fn set(&mut self, kind: RecordType, value: &str) -> Result<(), Error> {
        if kind == RecordType::Platform {
            error!("The platform record is set with set_platform()");
            return Err(Error::BadParam);
        }
        if !kind.is_string() || value.as_bytes().contains(&0) {
            return Err(Error::BadParam);
        }
        let record = self.find(kind)?;
        self.write_string(&record, value)
    }

    /// Store raw bytes in an opaque record.
    pub fn set_bytes(&mut self, kind: RecordType, value: &[u8]) -> Result<(), Error> {
        if kind.is_string() {
            return Err(Error::BadParam);
        }
        let record = self.find(kind)?;
        if value.len() > record.capacity {
            return Err(Error::ValueTooLarge);
        }
        let payload = &mut self.cache[record.payload()];
        payload.fill(0);
        payload[..value.len()].copy_from_slice(value);
        Ok(())
    }

    pub fn platform(&self) -> Result<Platform, Error> {
        let record = self.find(RecordType::Platform)?;
        Platform::from_tag(self.string_at(&record)?).ok_or(Error::DataCorruption)
    }

    pub fn set_platform(&mut self, platform: Platform) -> Result<(), Error> {
        let record = self.find(RecordType::Platform)?;
        self.write_string(&record, platform.as_str())
    }

    /// Write the whole cache back to the slot in one operation.
    ///
    /// Not retried on failure.
    pub fn commit(&mut self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        match self.storage.write(0, &self.cache) {
            Ok(()) => {
                info!("Identity records written to slot {}", SLOT);
                Ok(())
            }
            Err(_) => {
                error!("Failed to write slot {}", SLOT);
                Err(Error::WriteError)
            }
        }
    }

    /// Log every record.
    pub fn dump(&self) {
        for record in self.records() {
            if record.kind.is_string() {
                info!(
                    "{} @{} [{}]: {}",
                    record.kind.name(),
                    record.offset,
                    record.capacity,
                    self.string_at(&record).unwrap_or("<invalid>")
                );
            } else {
                info!(
                    "type {} @{} [{}]: {}",
                    record.kind.code(),
                    record.offset,
                    record.capacity,
                    printable(&self.cache[record.payload()])
                );
            }
        }
    }

    fn find(&self, kind: RecordType) -> Result<RecordInfo, Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        self.records()
            .find(|r| r.kind == kind)
            .ok_or(Error::NotFound)
    }

    fn string_at(&self, record: &RecordInfo) -> Result<&str, Error> {
        let payload = &self.cache[record.payload()];
        let len = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
        core::str::from_utf8(&payload[..len]).map_err(|_| Error::BadParam)
    }

    fn write_string(&mut self, record: &RecordInfo, value: &str) -> Result<(), Error> {
        if value.len() + 1 > record.capacity {
            return Err(Error::ValueTooLarge);
        }
        let payload = &mut self.cache[record.payload()];
        payload.fill(0);
        payload[..value.len()].copy_from_slice(value.as_bytes());
        Ok(())
    }

    fn scan(&self) -> Scan {
        let mut scan = Scan::default();
        let mut offset = 0;
        loop {
            let record = match read_record(&self.cache, offset) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    scan.end = offset;
                    return scan;
                }
                Err(_) => {
                    scan.corrupt = true;
                    return scan;
                }
            };
            match record.kind {
                RecordType::Platform if scan.platform.is_some() => {
                    warn!("Duplicate platform record at {}", offset);
                    scan.corrupt = true;
                    return scan;
                }
                RecordType::Platform => scan.platform = Some(record),
                RecordType::Cpid | RecordType::Env | RecordType::Duid => {
                    let bit = 1 << (record.kind.code() - RecordType::Cpid.code());
                    if scan.seen & bit != 0 {
                        warn!("Duplicate {} record at {}", record.kind.name(), offset);
                        scan.corrupt = true;
                        return scan;
                    }
                    scan.seen |= bit;
                    scan.identity_fields += 1;
                }
                _ => {}
            }
            offset = record.offset + HEADER_LEN + record.capacity;
        }
    }

    fn recover(&mut self, reason: &str) -> Result<LoadStatus, Error> {
        error!("Slot {}: {}, resetting identity records", SLOT, reason);
        self.reset()?;
        Err(Error::DataCorruption)
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.cache.fill(0);
        self.write_blank_chain(0)
    }

    fn write_blank_chain(&mut self, start: usize) -> Result<(), Error> {
        let needed: usize = BLANK_CHAIN
            .iter()
            .map(|(_, capacity)| HEADER_LEN + capacity)
            .sum::<usize>()
            + HEADER_LEN;
        if start + needed > SLOT_SIZE {
            return Err(Error::OutOfBounds);
        }

        let mut offset = start;
        for (kind, capacity) in BLANK_CHAIN {
            let next = offset + HEADER_LEN + capacity;
            self.cache[offset..offset + HEADER_LEN].copy_from_slice(&encode_header(next, kind)?);
            self.cache[offset + HEADER_LEN..next].fill(0);
            offset = next;
        }
        self.cache[offset..offset + HEADER_LEN]
            .copy_from_slice(&encode_header(0, RecordType::Empty)?);

        let platform = self.find(RecordType::Platform)?;
        self.write_string(&platform, Platform::AZURE_TAG)
    }
}

//! Binary envelope codec.
//!
//! Layout (little-endian):
//!
//! ```text
//! magic          4 bytes  "LDCK"
//! schema_version u32
//! model_id       16 bytes
//! owner          u8 tag + u32 len + utf-8 bytes
//! created_at     i64 ns since epoch
//! trained_at     i64 ns since epoch
//! version        u64
//! parameters     F 16 f64, B 32 f64, Q 16 f64, R f64
//! last_state     x 4 f64, P 16 f64
//! stats          mae f64, rmse f64, ewma f64, seen u64,
//!                has_last_update u8 [+ i64 ns]
//! feature_names  u32 count, each u32 len + utf-8 bytes
//! (unknown tail bytes tolerated on read)
//! crc32          u32 over everything before the trailer
//! ```

use chrono::{DateTime, TimeZone, Utc};
use ndarray::{Array1, Array2};
use uuid::Uuid;

use larder_models::{CategoryKey, ItemId, TrainingStats};
use larder_ssm::{ModelParameters, ModelState, FEATURE_DIM, STATE_DIM};

use crate::checkpoint::{CheckpointOwner, ModelCheckpoint};
use crate::error::CheckpointError;

/// Schema version this build writes and reads.
pub const SCHEMA_VERSION: u32 = 1;

const MAGIC: [u8; 4] = *b"LDCK";

/// Encodes a checkpoint into the binary envelope.
pub fn encode(checkpoint: &ModelCheckpoint) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1024);
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    buf.extend_from_slice(checkpoint.model_id.as_bytes());

    buf.push(checkpoint.owner.tag());
    put_str(&mut buf, checkpoint.owner.key());

    buf.extend_from_slice(&nanos(checkpoint.created_at).to_le_bytes());
    buf.extend_from_slice(&nanos(checkpoint.trained_at).to_le_bytes());
    buf.extend_from_slice(&checkpoint.version.to_le_bytes());

    for &v in checkpoint.parameters.f().iter() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    for &v in checkpoint.parameters.b().iter() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    for &v in checkpoint.parameters.q().iter() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf.extend_from_slice(&checkpoint.parameters.r().to_le_bytes());

    for &v in checkpoint.last_state.x().iter() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    for &v in checkpoint.last_state.p().iter() {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    buf.extend_from_slice(&checkpoint.stats.mae.to_le_bytes());
    buf.extend_from_slice(&checkpoint.stats.rmse.to_le_bytes());
    buf.extend_from_slice(&checkpoint.stats.ewma_error.to_le_bytes());
    buf.extend_from_slice(&checkpoint.stats.observations_seen.to_le_bytes());
    match checkpoint.stats.last_update_at {
        Some(at) => {
            buf.push(1);
            buf.extend_from_slice(&nanos(at).to_le_bytes());
        }
        None => buf.push(0),
    }

    buf.extend_from_slice(&(checkpoint.feature_names.len() as u32).to_le_bytes());
    for name in &checkpoint.feature_names {
        put_str(&mut buf, name);
    }

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

/// Decodes a checkpoint from the binary envelope.
///
/// # Errors
///
/// | Variant | Trigger |
/// |---------|---------|
/// | [`CheckpointError::Truncated`] | buffer shorter than the layout requires |
/// | [`CheckpointError::BadMagic`] | magic prefix missing |
/// | [`CheckpointError::CrcMismatch`] | trailer does not match the payload |
/// | [`CheckpointError::SchemaMismatch`] | envelope written by a different schema |
/// | [`CheckpointError::InvalidField`] | malformed owner, timestamp, or name |
pub fn decode(bytes: &[u8]) -> Result<ModelCheckpoint, CheckpointError> {
    if bytes.len() < MAGIC.len() + 8 {
        return Err(CheckpointError::Truncated {
            need: MAGIC.len() + 8,
            got: bytes.len(),
        });
    }
    if bytes[..4] != MAGIC {
        return Err(CheckpointError::BadMagic);
    }

    let (payload, trailer) = bytes.split_at(bytes.len() - 4);
    let expected = u32::from_le_bytes(trailer.try_into().expect("trailer is 4 bytes"));
    let got = crc32fast::hash(payload);
    if expected != got {
        return Err(CheckpointError::CrcMismatch { expected, got });
    }

    let mut reader = Reader::new(&payload[4..]);
    let schema = reader.u32()?;
    if schema != SCHEMA_VERSION {
        return Err(CheckpointError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: schema,
        });
    }

    let model_id = Uuid::from_bytes(
        reader
            .bytes(16)?
            .try_into()
            .expect("reader returned 16 bytes"),
    );

    let owner_tag = reader.u8()?;
    let owner_key = reader.string("owner")?;
    let owner = match owner_tag {
        0 => CheckpointOwner::Item(ItemId::new(owner_key)),
        1 => CheckpointOwner::Category(CategoryKey::new(owner_key)),
        tag => {
            return Err(CheckpointError::InvalidField {
                field: "owner",
                reason: format!("unknown tag {tag}"),
            })
        }
    };

    let created_at = from_nanos(reader.i64()?);
    let trained_at = from_nanos(reader.i64()?);
    let version = reader.u64()?;

    let f = reader.matrix(STATE_DIM, STATE_DIM)?;
    let b = reader.matrix(STATE_DIM, FEATURE_DIM)?;
    let q = reader.matrix(STATE_DIM, STATE_DIM)?;
    let r = reader.f64()?;
    let parameters = ModelParameters::new(f, b, q, r);

    let mut x = Array1::zeros(STATE_DIM);
    for i in 0..STATE_DIM {
        x[i] = reader.f64()?;
    }
    let p = reader.matrix(STATE_DIM, STATE_DIM)?;
    let last_state = ModelState::new(x, p);

    let mae = reader.f64()?;
    let rmse = reader.f64()?;
    let ewma_error = reader.f64()?;
    let observations_seen = reader.u64()?;
    let last_update_at = match reader.u8()? {
        0 => None,
        _ => Some(from_nanos(reader.i64()?)),
    };
    let stats = TrainingStats {
        mae,
        rmse,
        ewma_error,
        observations_seen,
        last_update_at,
    };

    let n_names = reader.u32()? as usize;
    let mut feature_names = Vec::with_capacity(n_names.min(64));
    for _ in 0..n_names {
        feature_names.push(reader.string("feature_names")?);
    }

    // Remaining payload bytes, if any, belong to a newer writer of the
    // same schema and are ignored.

    Ok(ModelCheckpoint {
        model_id,
        owner,
        version,
        parameters,
        last_state,
        created_at,
        trained_at,
        feature_names,
        stats,
    })
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn nanos(at: DateTime<Utc>) -> i64 {
    // Representable until 2262; checkpoint timestamps are wall-clock.
    at.timestamp_nanos_opt()
        .expect("checkpoint timestamps fit in i64 nanoseconds")
}

fn from_nanos(ns: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(ns)
}

/// Little-endian field reader over a byte slice.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], CheckpointError> {
        if self.pos + n > self.buf.len() {
            return Err(CheckpointError::Truncated {
                need: self.pos + n,
                got: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CheckpointError> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CheckpointError> {
        Ok(u32::from_le_bytes(self.bytes(4)?.try_into().expect("4 bytes")))
    }

    fn u64(&mut self) -> Result<u64, CheckpointError> {
        Ok(u64::from_le_bytes(self.bytes(8)?.try_into().expect("8 bytes")))
    }

    fn i64(&mut self) -> Result<i64, CheckpointError> {
        Ok(i64::from_le_bytes(self.bytes(8)?.try_into().expect("8 bytes")))
    }

    fn f64(&mut self) -> Result<f64, CheckpointError> {
        Ok(f64::from_le_bytes(self.bytes(8)?.try_into().expect("8 bytes")))
    }

    fn string(&mut self, field: &'static str) -> Result<String, CheckpointError> {
        let len = self.u32()? as usize;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CheckpointError::InvalidField {
            field,
            reason: "not utf-8".to_string(),
        })
    }

    fn matrix(&mut self, rows: usize, cols: usize) -> Result<Array2<f64>, CheckpointError> {
        let mut m = Array2::zeros((rows, cols));
        for i in 0..rows {
            for j in 0..cols {
                m[[i, j]] = self.f64()?;
            }
        }
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_ssm::StateSpaceModel;

    fn sample(owner: CheckpointOwner) -> ModelCheckpoint {
        let params = ModelParameters::defaults();
        let mut state = StateSpaceModel::new(params.clone()).initialize(
            3.5,
            &[(0.0, 4.0), (1.0, 3.75)],
            None,
            4.0,
        );
        // Exercise non-trivial covariance entries.
        let model = StateSpaceModel::new(params.clone());
        let (predicted, _) = model.predict(&state, &[0.5; FEATURE_DIM]);
        state = model.update(predicted, 3.4, 4.0).unwrap().state;

        let mut stats = TrainingStats::new();
        stats.update(0.15, 0.3, Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap());

        ModelCheckpoint {
            model_id: Uuid::from_u128(0x1234_5678_9abc_def0_1122_3344_5566_7788),
            owner,
            version: 7,
            parameters: params,
            last_state: state,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            trained_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
            feature_names: vec!["dow".to_string(), "weekend".to_string()],
            stats,
        }
    }

    #[test]
    fn round_trip_item_owner() {
        let ckpt = sample(CheckpointOwner::Item(ItemId::from("milk-1l")));
        let decoded = decode(&encode(&ckpt)).unwrap();
        assert_eq!(decoded, ckpt);
    }

    #[test]
    fn round_trip_category_owner() {
        let ckpt = sample(CheckpointOwner::Category(CategoryKey::from("Dairy")));
        let decoded = decode(&encode(&ckpt)).unwrap();
        assert_eq!(decoded, ckpt);
    }

    #[test]
    fn round_trip_no_stats_timestamp() {
        let mut ckpt = sample(CheckpointOwner::Item(ItemId::from("milk")));
        ckpt.stats = TrainingStats::new();
        let decoded = decode(&encode(&ckpt)).unwrap();
        assert_eq!(decoded.stats.last_update_at, None);
        assert_eq!(decoded, ckpt);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = encode(&sample(CheckpointOwner::Item(ItemId::from("milk"))));
        bytes[0] = b'X';
        assert_eq!(decode(&bytes), Err(CheckpointError::BadMagic));
    }

    #[test]
    fn flipped_byte_fails_crc() {
        let mut bytes = encode(&sample(CheckpointOwner::Item(ItemId::from("milk"))));
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        assert!(matches!(
            decode(&bytes),
            Err(CheckpointError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn truncated_rejected() {
        let bytes = encode(&sample(CheckpointOwner::Item(ItemId::from("milk"))));
        assert!(matches!(
            decode(&bytes[..10]),
            Err(CheckpointError::Truncated { .. })
        ));
    }

    #[test]
    fn random_garbage_rejected() {
        let garbage: Vec<u8> = (0..256).map(|i| (i * 31 % 251) as u8).collect();
        assert!(decode(&garbage).is_err());
    }

    #[test]
    fn schema_mismatch_rejected() {
        let mut bytes = encode(&sample(CheckpointOwner::Item(ItemId::from("milk"))));
        // Patch the schema version and re-seal the trailer.
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        let len = bytes.len();
        let crc = crc32fast::hash(&bytes[..len - 4]);
        bytes[len - 4..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(
            decode(&bytes),
            Err(CheckpointError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                got: 99
            })
        );
    }

    #[test]
    fn unknown_tail_ignored() {
        let ckpt = sample(CheckpointOwner::Item(ItemId::from("milk")));
        let mut bytes = encode(&ckpt);
        // Splice extra bytes between the known fields and the trailer.
        bytes.truncate(bytes.len() - 4);
        bytes.extend_from_slice(&[0xAA; 24]);
        let crc = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, ckpt);
    }

    #[test]
    fn round_trip_preserves_floats_exactly() {
        let ckpt = sample(CheckpointOwner::Item(ItemId::from("milk")));
        let decoded = decode(&encode(&ckpt)).unwrap();
        for (a, b) in ckpt
            .last_state
            .p()
            .iter()
            .zip(decoded.last_state.p().iter())
        {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}

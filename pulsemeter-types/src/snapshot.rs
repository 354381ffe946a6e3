//! Snapshot - the aggregated pulse metrics for one tick.

use alloc::string::String;

/// Aggregated pulse metrics for a single tick.
///
/// The windowed fields are sums of per-second samples, not averages:
/// `pulse_per_hour` is the number of pulses seen during the last hour (or
/// since startup, before the first hour has elapsed).
///
/// Field names are the wire contract and must not be renamed.
///
/// # Example
///
/// ```rust
/// use pulsemeter_types::Snapshot;
///
/// let snapshot = Snapshot::builder()
///     .uuid("device-1")
///     .gpio(37)
///     .per_second(5)
///     .multiplier(2.0)
///     .build();
///
/// assert_eq!(snapshot.pulse_per_second, 5);
/// assert_eq!(snapshot.pps_mult, 10.0);
///
/// // Serialize with serde (requires "serde" feature)
/// // let json = serde_json::to_string(&snapshot)?;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Device identifier.
    pub uuid: String,

    /// Physical pin number of the pulse input.
    pub gpio: u8,

    /// Pulses counted during the last interval.
    pub pulse_per_second: u64,

    /// Sum of the last 60 per-second samples.
    pub pulse_per_minute: u64,

    /// Sum of the last 3600 per-second samples.
    pub pulse_per_hour: u64,

    /// Pulses since startup or the last reset.
    pub pulse_count: u64,

    /// `pulse_per_second` scaled by the multiplier.
    pub pps_mult: f64,

    /// `pulse_per_minute` scaled by the multiplier.
    pub ppm_mult: f64,

    /// `pulse_per_hour` scaled by the multiplier.
    pub pph_mult: f64,
}

impl Snapshot {
    /// Create a builder for constructing snapshots.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }
}

/// Builder for constructing `Snapshot` instances.
///
/// The scaled fields are derived in [`SnapshotBuilder::build`] so they can
/// never disagree with the raw counts.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    uuid: String,
    gpio: u8,
    per_second: u64,
    per_minute: u64,
    per_hour: u64,
    pulse_count: u64,
    multiplier: f64,
}

impl SnapshotBuilder {
    /// Create a new builder with zero counts and a multiplier of 1.
    pub fn new() -> Self {
        Self {
            uuid: String::new(),
            gpio: 0,
            per_second: 0,
            per_minute: 0,
            per_hour: 0,
            pulse_count: 0,
            multiplier: 1.0,
        }
    }

    /// Set the device identifier.
    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    /// Set the pulse input pin.
    pub fn gpio(mut self, pin: u8) -> Self {
        self.gpio = pin;
        self
    }

    /// Set the per-second sample.
    pub fn per_second(mut self, count: u64) -> Self {
        self.per_second = count;
        self
    }

    /// Set the one-minute windowed sum.
    pub fn per_minute(mut self, count: u64) -> Self {
        self.per_minute = count;
        self
    }

    /// Set the one-hour windowed sum.
    pub fn per_hour(mut self, count: u64) -> Self {
        self.per_hour = count;
        self
    }

    /// Set the cumulative pulse count.
    pub fn pulse_count(mut self, count: u64) -> Self {
        self.pulse_count = count;
        self
    }

    /// Set the scale factor applied to the three rate fields.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> Snapshot {
        let m = self.multiplier;
        Snapshot {
            uuid: self.uuid,
            gpio: self.gpio,
            pulse_per_second: self.per_second,
            pulse_per_minute: self.per_minute,
            pulse_per_hour: self.per_hour,
            pulse_count: self.pulse_count,
            pps_mult: self.per_second as f64 * m,
            ppm_mult: self.per_minute as f64 * m,
            pph_mult: self.per_hour as f64 * m,
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_builder() {
        let snapshot = Snapshot::builder()
            .uuid("abc")
            .gpio(37)
            .per_second(3)
            .per_minute(40)
            .per_hour(900)
            .pulse_count(1234)
            .build();

        assert_eq!(snapshot.uuid, "abc");
        assert_eq!(snapshot.gpio, 37);
        assert_eq!(snapshot.pulse_per_second, 3);
        assert_eq!(snapshot.pulse_per_minute, 40);
        assert_eq!(snapshot.pulse_per_hour, 900);
        assert_eq!(snapshot.pulse_count, 1234);
    }

    #[test]
    fn default_multiplier_leaves_counts_unscaled() {
        let snapshot = Snapshot::builder().per_second(7).per_hour(70).build();
        assert_eq!(snapshot.pps_mult, 7.0);
        assert_eq!(snapshot.pph_mult, 70.0);
    }

    #[test]
    fn scaled_fields_follow_multiplier() {
        let m = 0.001;
        let snapshot = Snapshot::builder()
            .per_second(5)
            .per_minute(300)
            .per_hour(18_000)
            .multiplier(m)
            .build();

        assert_eq!(snapshot.pps_mult, 5.0 * m);
        assert_eq!(snapshot.ppm_mult, 300.0 * m);
        assert_eq!(snapshot.pph_mult, 18_000.0 * m);
    }

    #[test]
    fn zero_multiplier_zeroes_scaled_fields() {
        let snapshot = Snapshot::builder().per_second(9).multiplier(0.0).build();
        assert_eq!(snapshot.pulse_per_second, 9);
        assert_eq!(snapshot.pps_mult, 0.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_uses_wire_field_names() {
        let snapshot = Snapshot::builder()
            .uuid("dev")
            .gpio(37)
            .per_second(5)
            .per_minute(5)
            .per_hour(5)
            .pulse_count(5)
            .multiplier(2.0)
            .build();

        let value = serde_json::to_value(&snapshot).unwrap();
        let object = value.as_object().unwrap();

        for key in [
            "uuid",
            "gpio",
            "pulse_per_second",
            "pulse_per_minute",
            "pulse_per_hour",
            "pulse_count",
            "pps_mult",
            "ppm_mult",
            "pph_mult",
        ] {
            assert!(object.contains_key(key), "missing field {key}");
        }
        assert_eq!(object.len(), 9);
        assert_eq!(value["uuid"], "dev");
        assert_eq!(value["pps_mult"], 10.0);
    }
}

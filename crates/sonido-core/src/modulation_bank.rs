//! Fixed-size modulation routing bank (§4.4).
//!
//! Generalizes [`crate::ModulationAmount`]'s single scalar depth/invert pair
//! into the full slot transform: an optional cubic-interpolated remap curve,
//! a power-curve S-shape, bipolar/stereo handling, and destination-range
//! scaling. [`ModulationConnectionBank`] holds [`BANK_SIZE`] fixed slots so a
//! connection's address is stable for its lifetime — callers hold a `usize`
//! slot index, not a pointer, across the connect/disconnect protocol of
//! §4.4.

#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::ModulationError;

/// Number of fixed routing slots in a [`ModulationConnectionBank`].
pub const BANK_SIZE: usize = 64;

/// A 1-D cubic-interpolated lookup table mapping `[0, 1] -> [0, 1]`, used
/// for non-identity modulation curve shaping ahead of the power curve.
#[derive(Debug, Clone)]
pub struct RemapLine {
    table: Vec<f32>,
}

impl RemapLine {
    /// Builds a remap curve from `table`, which must have at least 2
    /// points spanning input `0.0..=1.0` evenly.
    pub fn new(table: Vec<f32>) -> Self {
        debug_assert!(table.len() >= 2, "remap table needs at least 2 points");
        Self { table }
    }

    /// Samples the curve at `x` (clamped to `[0, 1]`) via Catmull-Rom cubic
    /// interpolation between the four nearest control points.
    pub fn sample(&self, x: f32) -> f32 {
        let n = self.table.len();
        if n < 2 {
            return x;
        }
        let x = x.clamp(0.0, 1.0);
        let scaled = x * (n - 1) as f32;
        let i0 = scaled.floor() as usize;
        let i0 = i0.min(n - 2);
        let t = scaled - i0 as f32;

        let p_minus1 = self.table[i0.saturating_sub(1)];
        let p0 = self.table[i0];
        let p1 = self.table[(i0 + 1).min(n - 1)];
        let p2 = self.table[(i0 + 2).min(n - 1)];

        catmull_rom(p_minus1, p0, p1, p2, t)
    }
}

fn catmull_rom(p_minus1: f32, p0: f32, p1: f32, p2: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p0)
        + (-p_minus1 + p1) * t
        + (2.0 * p_minus1 - 5.0 * p0 + 4.0 * p1 - p2) * t2
        + (-p_minus1 + 3.0 * p0 - 3.0 * p1 + p2) * t3)
}

/// `powerScale(x, p)`: a monotone S-curve with `powerScale(x, 0) == x`,
/// via the exponential transfer `(1 - e^(-p*x)) / (1 - e^(-p))`. Negative
/// `p` inverts the curve's concavity, handled naturally by the same
/// formula.
fn power_scale(x: f32, p: f32) -> f32 {
    if p.abs() < 1e-6 {
        x
    } else {
        (1.0 - libm::expf(-p * x)) / (1.0 - libm::expf(-p))
    }
}

/// Per-slot transform applied to a connected modulation source (§4.4).
#[derive(Debug, Clone)]
pub struct ModulationConnectionProcessor {
    /// Modulation amount, applied after the power curve.
    pub amount: f32,
    /// Power-curve exponent; 0.0 is the identity (linear) curve.
    pub power: f32,
    /// Whether the source is interpreted as bipolar (`2x' - 1`) rather
    /// than unipolar (`x'`).
    pub bipolar: bool,
    /// Whether this connection targets a stereo destination — the right
    /// lane's output is negated.
    pub stereo: bool,
    /// Optional remap curve applied before the bipolar/power stage.
    pub remap: Option<RemapLine>,
    /// The destination parameter's native range (`max - min`), applied as
    /// the final scale so output lands in parameter-native units.
    pub destination_scale: f32,
}

impl ModulationConnectionProcessor {
    /// Builds a processor with zero amount, linear power curve, and the
    /// given default polarity and destination scale.
    pub fn new(bipolar_default: bool, destination_scale: f32) -> Self {
        Self {
            amount: 0.0,
            power: 0.0,
            bipolar: bipolar_default,
            stereo: false,
            remap: None,
            destination_scale,
        }
    }

    /// Applies the transform to one sample of the (already unipolar,
    /// `[0, 1]`-clamped at the source) modulation signal.
    ///
    /// `is_right_lane` selects the stereo-flip sign for stereo slots; it is
    /// ignored for mono slots.
    pub fn apply(&self, source: f32, is_right_lane: bool) -> f32 {
        let x = source.clamp(0.0, 1.0);
        let x_mapped = match &self.remap {
            Some(remap) => remap.sample(x),
            None => x,
        };
        let s = if self.bipolar {
            2.0 * x_mapped - 1.0
        } else {
            x_mapped
        };
        let y = s.signum() * power_scale(s.abs(), self.power);
        let out_pre = self.amount * y;
        let stereo_scale = if self.stereo && is_right_lane { -1.0 } else { 1.0 };
        out_pre * self.destination_scale * stereo_scale
    }
}

/// One entry in the fixed [`BANK_SIZE`]-slot modulation bank (§3
/// `ModulationConnection`). A slot is free iff both names are absent.
#[derive(Debug, Clone)]
pub struct ModulationConnection {
    source_name: Option<String>,
    destination_name: Option<String>,
    /// The slot's transform. Valid to read/write regardless of whether the
    /// slot is connected; only meaningful once `is_free()` is false.
    pub processor: ModulationConnectionProcessor,
    polyphonic: bool,
}

impl ModulationConnection {
    fn empty() -> Self {
        Self {
            source_name: None,
            destination_name: None,
            processor: ModulationConnectionProcessor::new(false, 1.0),
            polyphonic: false,
        }
    }

    /// Whether this slot currently holds no connection.
    #[inline]
    pub fn is_free(&self) -> bool {
        self.source_name.is_none() && self.destination_name.is_none()
    }

    /// The connected source's stable name, if any.
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// The connected destination's stable name, if any.
    pub fn destination_name(&self) -> Option<&str> {
        self.destination_name.as_deref()
    }

    /// Whether this slot is routed through a polyphonic summing node. A
    /// slot is polyphonic iff its source is polyphonic and the destination
    /// exposes a polyphonic summing node; rewired only at connect time
    /// (§4.4 "Polyphonic vs monophonic").
    #[inline]
    pub fn is_polyphonic(&self) -> bool {
        self.polyphonic
    }
}

/// The fixed 64-slot modulation routing bank (§3 `ModulationConnectionBank`,
/// §4.4).
pub struct ModulationConnectionBank {
    slots: Vec<ModulationConnection>,
}

impl ModulationConnectionBank {
    /// Builds a bank with all [`BANK_SIZE`] slots free.
    pub fn new() -> Self {
        Self {
            slots: vec![ModulationConnection::empty(); BANK_SIZE],
        }
    }

    /// Number of slots, always [`BANK_SIZE`].
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of currently connected slots.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    /// Read access to a slot by index.
    pub fn slot(&self, index: usize) -> Option<&ModulationConnection> {
        self.slots.get(index)
    }

    /// Mutable access to a slot's transform, e.g. to adjust `amount`/`power`
    /// on an already-connected slot without a disconnect/reconnect round
    /// trip.
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut ModulationConnection> {
        self.slots.get_mut(index)
    }

    /// Finds the slot connecting `source_name` to `destination_name`, if any.
    pub fn find(&self, source_name: &str, destination_name: &str) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.source_name.as_deref() == Some(source_name)
                && s.destination_name.as_deref() == Some(destination_name)
        })
    }

    /// Wires `source_name` to `destination_name` (§4.4 connection
    /// protocol): allocates a free slot, records the names, and sets the
    /// slot's default polarity and destination scale. Rejects a self-loop
    /// where the destination is the slot's own amount control.
    ///
    /// Installing the slot's scaled output into the destination's summing
    /// node and flipping the destination's modulation switch is the
    /// router's responsibility once it receives the returned slot index —
    /// this call only reserves and configures the bank entry.
    pub fn connect(
        &mut self,
        source_name: &str,
        destination_name: &str,
        bipolar_default: bool,
        polyphonic: bool,
        destination_scale: f32,
    ) -> Result<usize, ModulationError> {
        if source_name == destination_name {
            return Err(ModulationError::SelfLoop(String::from(source_name)));
        }
        let index = self
            .slots
            .iter()
            .position(ModulationConnection::is_free)
            .ok_or(ModulationError::BankFull)?;

        let slot = &mut self.slots[index];
        slot.source_name = Some(String::from(source_name));
        slot.destination_name = Some(String::from(destination_name));
        slot.processor = ModulationConnectionProcessor::new(bipolar_default, destination_scale);
        slot.polyphonic = polyphonic;
        Ok(index)
    }

    /// Frees the slot at `index` (the inverse of [`connect`](Self::connect)).
    /// Flipping the destination's modulation switch back to 0 once its
    /// connected-input count reaches zero is the router's responsibility.
    pub fn disconnect(&mut self, index: usize) -> Result<(), ModulationError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(ModulationError::InvalidSlot(index))?;
        *slot = ModulationConnection::empty();
        Ok(())
    }

    /// Finds and frees the slot connecting `source_name` to
    /// `destination_name`.
    pub fn disconnect_by_names(
        &mut self,
        source_name: &str,
        destination_name: &str,
    ) -> Result<(), ModulationError> {
        let index = self.find(source_name, destination_name).ok_or_else(|| {
            ModulationError::ConnectionNotFound(String::from(source_name), String::from(destination_name))
        })?;
        self.disconnect(index)
    }

    /// Frees every slot.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = ModulationConnection::empty();
        }
    }

    /// Iterates over the active (connected) slots, in slot order.
    pub fn active_slots(&self) -> impl Iterator<Item = (usize, &ModulationConnection)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_free())
    }
}

impl Default for ModulationConnectionBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_allocates_a_free_slot() {
        let mut bank = ModulationConnectionBank::new();
        let slot = bank.connect("lfo_1", "osc_1_level", true, true, 1.0).unwrap();
        assert!(!bank.slot(slot).unwrap().is_free());
        assert_eq!(bank.active_count(), 1);
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut bank = ModulationConnectionBank::new();
        let err = bank
            .connect("modulation_1_amount", "modulation_1_amount", false, false, 1.0)
            .unwrap_err();
        assert!(matches!(err, ModulationError::SelfLoop(_)));
        assert_eq!(bank.active_count(), 0);
    }

    #[test]
    fn bank_rejects_connection_past_capacity() {
        let mut bank = ModulationConnectionBank::new();
        for i in 0..BANK_SIZE {
            bank.connect(&alloc_format(i), "dest", true, false, 1.0).unwrap();
        }
        let err = bank.connect("one_too_many", "dest", true, false, 1.0).unwrap_err();
        assert!(matches!(err, ModulationError::BankFull));
    }

    fn alloc_format(i: usize) -> String {
        #[cfg(not(feature = "std"))]
        use alloc::format;
        format!("source_{i}")
    }

    #[test]
    fn disconnect_frees_the_slot() {
        let mut bank = ModulationConnectionBank::new();
        let slot = bank.connect("lfo_1", "osc_1_level", true, true, 1.0).unwrap();
        bank.disconnect(slot).unwrap();
        assert!(bank.slot(slot).unwrap().is_free());
        assert_eq!(bank.active_count(), 0);
    }

    #[test]
    fn disconnect_by_names_finds_the_right_slot() {
        let mut bank = ModulationConnectionBank::new();
        bank.connect("lfo_1", "osc_1_level", true, true, 1.0).unwrap();
        bank.disconnect_by_names("lfo_1", "osc_1_level").unwrap();
        assert_eq!(bank.active_count(), 0);
    }

    #[test]
    fn unipolar_zero_amount_produces_zero_output() {
        let proc = ModulationConnectionProcessor::new(false, 1.0);
        assert_eq!(proc.apply(0.5, false), 0.0);
    }

    #[test]
    fn bipolar_midpoint_source_is_zero_output() {
        let mut proc = ModulationConnectionProcessor::new(true, 100.0);
        proc.amount = 1.0;
        // source = 0.5 -> s = 2*0.5 - 1 = 0.0 -> y = 0
        assert!(proc.apply(0.5, false).abs() < 1e-6);
    }

    #[test]
    fn bipolar_full_scale_reaches_destination_range() {
        let mut proc = ModulationConnectionProcessor::new(true, 10.0);
        proc.amount = 1.0;
        let high = proc.apply(1.0, false);
        assert!((high - 10.0).abs() < 1e-4, "expected ~10.0, got {high}");
        let low = proc.apply(0.0, false);
        assert!((low - (-10.0)).abs() < 1e-4, "expected ~-10.0, got {low}");
    }

    #[test]
    fn stereo_flips_right_lane_sign() {
        let mut proc = ModulationConnectionProcessor::new(true, 10.0);
        proc.amount = 1.0;
        proc.stereo = true;
        let left = proc.apply(1.0, false);
        let right = proc.apply(1.0, true);
        assert!((left + right).abs() < 1e-4);
    }

    #[test]
    fn power_zero_is_identity_curve() {
        assert!((power_scale(0.37, 0.0) - 0.37).abs() < 1e-6);
    }

    #[test]
    fn remap_line_identity_table_is_a_no_op() {
        let remap = RemapLine::new(vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        for &x in &[0.0, 0.2, 0.5, 0.8, 1.0] {
            let y = remap.sample(x);
            assert!((y - x).abs() < 0.02, "x={x} y={y}");
        }
    }
}

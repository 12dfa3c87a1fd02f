// Cumulative energy from a wrapping hardware counter (RAPL energy_uj style)

use std::collections::HashMap;

pub const MICROJOULE_PER_KWH: f64 = 3.6e12;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct EnergyState {
    prev_uj: Option<i64>,
    /// Carried energy from earlier wraps, in µJ.
    offset_uj: i128,
    range_uj: Option<i64>,
}

/// Keeps a per-key cumulative total that only goes up while the counter wraps at a known range.
/// Without a known range a decrease is taken as a counter reset and the carry is dropped.
#[derive(Debug, Default)]
pub struct EnergyAccumulator {
    state: HashMap<String, EnergyState>,
}

impl EnergyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns kWh, or `None` (and forgets `key`) when no counter was reported.
    /// A range of 0 or below counts as unknown.
    pub fn compute(
        &mut self,
        key: &str,
        energy_uj: Option<i64>,
        range_uj: Option<i64>,
    ) -> Option<f64> {
        let Some(current) = energy_uj else {
            self.state.remove(key);
            return None;
        };

        let st = self.state.entry(key.to_string()).or_default();
        if let Some(r) = range_uj.filter(|r| *r > 0) {
            st.range_uj = Some(r);
        }

        if let Some(prev) = st.prev_uj
            && current < prev
        {
            match st.range_uj {
                Some(range) if prev <= range => st.offset_uj += i128::from(range),
                _ => st.offset_uj = 0,
            }
        }
        st.prev_uj = Some(current);

        Some((st.offset_uj + i128::from(current)) as f64 / MICROJOULE_PER_KWH)
    }

    #[cfg(test)]
    fn contains(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }
}

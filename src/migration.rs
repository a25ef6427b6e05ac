// ============================================================================
// SETTINGS MIGRATION - ordered (threshold, transform) steps
// ============================================================================
//
// A migration plan is a static list of steps.  Each step fires when the
// document's version is inside its band.  After a run the plan stamps the
// document with the version it migrated to, and later runs start from
// max(version given, version recorded), which makes a second call a no-op
// even for transforms that are not idempotent on their own (value rescales,
// mode remaps).

use crate::settings::SettingsStore;
use crate::version::{self, Version};

/// Reserved key the encoder plans stamp their documents with.
pub const MIGRATED_VERSION_KEY: &str = "Encoder.MigratedVersion";

/// Version band a step applies to.
#[derive(Clone, Copy, Debug)]
pub enum Threshold {
    /// `version <= v`
    AtOrBelow(Version),
    /// `version < v`
    Below(Version),
}

impl Threshold {
    pub fn matches(self, version: Version) -> bool {
        match self {
            Threshold::AtOrBelow(v) => version <= v,
            Threshold::Below(v) => version < v,
        }
    }
}

pub struct MigrationStep {
    pub name: &'static str,
    pub threshold: Threshold,
    pub apply: fn(&mut SettingsStore),
}

pub struct MigrationPlan {
    /// Log prefix, e.g. `encoder::nvenc`.
    pub component: &'static str,
    /// Key the migrated-to version is recorded under.
    pub stamp_key: &'static str,
    pub steps: &'static [MigrationStep],
}

impl MigrationPlan {
    /// Version a previous run recorded in `settings`, if any.
    pub fn recorded_version(&self, settings: &SettingsStore) -> Option<Version> {
        settings
            .user_value(self.stamp_key)
            .map(|_| Version::from_raw(settings.get_int(self.stamp_key) as u64))
    }

    /// Run every step whose band contains the effective version, then stamp
    /// the document.  Never fails.
    pub fn run(&self, settings: &mut SettingsStore, version: Version) {
        let mut effective = version.masked_update();
        if let Some(recorded) = self.recorded_version(settings) {
            effective = effective.max(recorded);
        }

        for step in self.steps {
            if step.threshold.matches(effective) {
                log::debug!(
                    "<{}> applying migration '{}' to settings from {}",
                    self.component,
                    step.name,
                    effective
                );
                (step.apply)(settings);
            }
        }

        let stamp = effective.max(version::CURRENT);
        settings.set_int(self.stamp_key, stamp.raw() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump(settings: &mut SettingsStore) {
        let v = settings.get_int("Counter");
        settings.set_int("Counter", v + 1);
    }

    static PLAN: MigrationPlan = MigrationPlan {
        component: "test",
        stamp_key: MIGRATED_VERSION_KEY,
        steps: &[
            MigrationStep {
                name: "old",
                threshold: Threshold::AtOrBelow(Version::new(0, 8, 0, 0)),
                apply: bump,
            },
            MigrationStep {
                name: "newer",
                threshold: Threshold::Below(Version::new(0, 11, 0, 0)),
                apply: bump,
            },
        ],
    };

    #[test]
    fn bands_are_cumulative() {
        let mut s = SettingsStore::new();
        PLAN.run(&mut s, Version::new(0, 8, 0, 0));
        assert_eq!(s.get_int("Counter"), 2);

        let mut s = SettingsStore::new();
        PLAN.run(&mut s, Version::new(0, 10, 0, 0));
        assert_eq!(s.get_int("Counter"), 1);

        let mut s = SettingsStore::new();
        PLAN.run(&mut s, Version::new(0, 11, 0, 0));
        assert_eq!(s.get_int("Counter"), 0);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut s = SettingsStore::new();
        PLAN.run(&mut s, Version::new(0, 8, 0, 3));
        let once = s.clone();
        PLAN.run(&mut s, Version::new(0, 8, 0, 3));
        assert_eq!(s.get_int("Counter"), once.get_int("Counter"));
        assert_eq!(
            PLAN.recorded_version(&s),
            Some(version::CURRENT)
        );
    }
}

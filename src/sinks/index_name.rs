//! The index-name function (§4.6.6): given a pattern and a rotation cadence,
//! produces a closure that yields the current target index at call time.

use avforward_core::CoreError;
use chrono::{DateTime, Datelike, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationCadence {
	Daily,
	Weekly,
	Monthly,
	Yearly,
	None,
}

impl RotationCadence {
	/// Parses a configuration string. Unknown values are a `ConfigFatal` at init,
	/// never a runtime surprise.
	pub fn parse(raw: &str) -> Result<Self, CoreError> {
		match raw.to_ascii_lowercase().as_str() {
			"daily" => Ok(RotationCadence::Daily),
			"weekly" => Ok(RotationCadence::Weekly),
			"monthly" => Ok(RotationCadence::Monthly),
			"yearly" => Ok(RotationCadence::Yearly),
			"none" => Ok(RotationCadence::None),
			other => Err(CoreError::ConfigFatal(format!("unknown rotation cadence: {other}"))),
		}
	}
}

/// A zero-argument function yielding the current target index, closing over a
/// fixed pattern and cadence.
#[derive(Debug, Clone)]
pub struct IndexNameFn {
	pattern: String,
	cadence: RotationCadence,
}

impl IndexNameFn {
	pub fn new(pattern: impl Into<String>, cadence: RotationCadence) -> Self {
		IndexNameFn {
			pattern: pattern.into(),
			cadence,
		}
	}

	pub fn at(&self, now: DateTime<Utc>) -> String {
		match self.cadence {
			RotationCadence::Daily => format!("{}-{}", self.pattern, now.format("%Y%m%d")),
			RotationCadence::Weekly => format!("{}-{}{:02}", self.pattern, now.iso_week().year(), now.iso_week().week()),
			RotationCadence::Monthly => format!("{}-{}", self.pattern, now.format("%Y%m")),
			RotationCadence::Yearly => format!("{}-{}", self.pattern, now.format("%Y")),
			RotationCadence::None => self.pattern.clone(),
		}
	}

	pub fn now(&self) -> String {
		self.at(Utc::now())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn daily_rotation_matches_day_boundary() {
		let f = IndexNameFn::new("events", RotationCadence::Daily);
		let before = Utc.with_ymd_and_hms(2024, 6, 14, 23, 59, 58).unwrap();
		let after = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 2).unwrap();
		assert_eq!(f.at(before), "events-20240614");
		assert_eq!(f.at(after), "events-20240615");
	}

	#[test]
	fn none_cadence_is_the_bare_pattern() {
		let f = IndexNameFn::new("devices", RotationCadence::None);
		assert_eq!(f.at(Utc::now()), "devices");
	}

	#[test]
	fn unknown_cadence_is_rejected_at_parse_time() {
		assert!(RotationCadence::parse("fortnightly").is_err());
	}

	#[test]
	fn weekly_rotation_uses_iso_week_year_at_year_boundary() {
		let f = IndexNameFn::new("events", RotationCadence::Weekly);
		// 2024-12-30 is ISO week 1 of 2025, not calendar year 2024.
		let boundary = Utc.with_ymd_and_hms(2024, 12, 30, 12, 0, 0).unwrap();
		assert_eq!(f.at(boundary), "events-202501");
	}

	#[test]
	fn same_bucket_yields_same_name() {
		let f = IndexNameFn::new("events", RotationCadence::Monthly);
		let a = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
		let b = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap();
		assert_eq!(f.at(a), f.at(b));
	}
}

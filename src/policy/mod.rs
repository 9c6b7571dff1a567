use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Band, BandAmounts};
use crate::error::PolicyFileError;

pub const DEFAULT_POLICY_PATH: &str = "data/policy.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingReform {
    pub abolish_income_tax: bool,
    pub abolish_emp_payroll_tax: bool,
    pub abolish_self_emp_tax: bool,
    pub abolish_housing_subsidies: bool,
    pub abolish_tanf: bool,
    pub abolish_ssi: bool,
    pub abolish_snap: bool,
    pub abolish_wic: bool,
    pub baseline_abolish_snap_ea: bool,
    pub abolish_snap_ea: bool,
    pub flat_tax_deduct_ptc: bool,
    pub flat_tax: f64,
}

impl Default for FundingReform {
    fn default() -> Self {
        Self {
            abolish_income_tax: true,
            abolish_emp_payroll_tax: true,
            abolish_self_emp_tax: true,
            abolish_housing_subsidies: true,
            abolish_tanf: true,
            abolish_ssi: true,
            abolish_snap: true,
            abolish_wic: true,
            baseline_abolish_snap_ea: true,
            abolish_snap_ea: true,
            flat_tax_deduct_ptc: true,
            flat_tax: 0.40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAmounts {
    pub young_child_amount: i64,
    pub older_child_amount: i64,
    pub young_adult_amount: i64,
    pub adult_amount: i64,
    pub senior_amount: i64,
}

impl PolicyAmounts {
    pub fn from_amounts(amounts: &BandAmounts) -> Self {
        let rounded = |band| amounts.get(band).round() as i64;
        Self {
            young_child_amount: rounded(Band::YoungChild),
            older_child_amount: rounded(Band::OlderChild),
            young_adult_amount: rounded(Band::YoungAdult),
            adult_amount: rounded(Band::Adult),
            senior_amount: rounded(Band::Senior),
        }
    }

    pub fn to_amounts(&self) -> BandAmounts {
        BandAmounts([
            self.young_child_amount as f64,
            self.older_child_amount as f64,
            self.young_adult_amount as f64,
            self.adult_amount as f64,
            self.senior_amount as f64,
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlankSlateReform {
    #[serde(flatten)]
    pub funding: FundingReform,
    pub young_child_bi_amount: i64,
    pub older_child_bi_amount: i64,
    pub young_adult_bi_amount: i64,
    pub older_adult_bi_amount: i64,
    pub senior_bi_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyFile {
    pub policy: PolicyAmounts,
    #[serde(default)]
    pub funding: FundingReform,
}

impl PolicyFile {
    pub fn new(amounts: &BandAmounts, funding: FundingReform) -> Self {
        Self {
            policy: PolicyAmounts::from_amounts(amounts),
            funding,
        }
    }

    pub fn reform(&self) -> BlankSlateReform {
        BlankSlateReform {
            funding: self.funding.clone(),
            young_child_bi_amount: self.policy.young_child_amount,
            older_child_bi_amount: self.policy.older_child_amount,
            young_adult_bi_amount: self.policy.young_adult_amount,
            older_adult_bi_amount: self.policy.adult_amount,
            senior_bi_amount: self.policy.senior_amount,
        }
    }

    pub fn load(path: &Path) -> Result<Self, PolicyFileError> {
        let text = fs::read_to_string(path).map_err(|source| PolicyFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| PolicyFileError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), PolicyFileError> {
        let io_err = |source| PolicyFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let text = serde_yaml::to_string(self).map_err(|source| PolicyFileError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solved_amounts() -> BandAmounts {
        BandAmounts([2_499.6, 3_100.2, 9_800.5, 11_250.0, 14_999.49])
    }

    #[test]
    fn amounts_are_rounded_to_whole_currency() {
        let amounts = PolicyAmounts::from_amounts(&solved_amounts());
        assert_eq!(amounts.young_child_amount, 2_500);
        assert_eq!(amounts.older_child_amount, 3_100);
        assert_eq!(amounts.young_adult_amount, 9_801);
        assert_eq!(amounts.adult_amount, 11_250);
        assert_eq!(amounts.senior_amount, 14_999);
    }

    #[test]
    fn policy_file_round_trips_through_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data").join("policy.yaml");
        let file = PolicyFile::new(&solved_amounts(), FundingReform::default());

        file.save(&path).expect("saves");
        let loaded = PolicyFile::load(&path).expect("loads");
        assert_eq!(loaded, file);
    }

    #[test]
    fn policy_without_funding_section_uses_default_funding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("policy.yaml");
        fs::write(
            &path,
            "policy:\n  young_child_amount: 1\n  older_child_amount: 2\n  young_adult_amount: 3\n  adult_amount: 4\n  senior_amount: 5\n",
        )
        .expect("write policy");

        let loaded = PolicyFile::load(&path).expect("loads");
        assert_eq!(loaded.funding, FundingReform::default());
        assert_eq!(loaded.policy.to_amounts(), BandAmounts([1.0, 2.0, 3.0, 4.0, 5.0]));
    }

    #[test]
    fn reform_carries_funding_parameters_and_bi_amounts() {
        let file = PolicyFile::new(&solved_amounts(), FundingReform::default());
        let json = serde_json::to_value(file.reform()).expect("reform serializes");
        assert_eq!(json["abolish_snap"], serde_json::json!(true));
        assert_eq!(json["flat_tax"], serde_json::json!(0.4));
        assert_eq!(json["older_adult_bi_amount"], serde_json::json!(11_250));
        assert_eq!(json["senior_bi_amount"], serde_json::json!(14_999));
    }

    #[test]
    fn malformed_policy_is_a_yaml_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("policy.yaml");
        fs::write(&path, "policy: [not, a, mapping]\n").expect("write policy");
        let err = PolicyFile::load(&path).expect_err("must reject");
        assert!(matches!(err, PolicyFileError::Yaml { .. }));
    }
}

use std::collections::BTreeMap;

use crate::record::Record;

/// Single distributor entry as captured by the onboarding form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributorForm {
    pub distributor_name: String,
    pub mobile: String,
    pub address: String,
    pub target_area: String,
    pub pincode: String,
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

impl DistributorForm {
    /// Field name to error message. Empty when the form can be submitted.
    pub fn validate(&self) -> BTreeMap<&'static str, &'static str> {
        let mut errors = BTreeMap::new();

        if self.distributor_name.trim().is_empty() {
            errors.insert("distributor_name", "Distributor name is required");
        }

        if self.mobile.trim().is_empty() {
            errors.insert("mobile", "Mobile number is required");
        } else if !is_digits(&self.mobile, 10) {
            errors.insert("mobile", "Mobile number must be 10 digits");
        }

        if self.address.trim().is_empty() {
            errors.insert("address", "Address is required");
        }

        if self.target_area.trim().is_empty() {
            errors.insert("target_area", "Target area is required");
        }

        if self.pincode.trim().is_empty() {
            errors.insert("pincode", "Pincode is required");
        } else if !is_digits(&self.pincode, 6) {
            errors.insert("pincode", "Pincode must be 6 digits");
        }

        errors
    }

    pub fn to_record(&self) -> Record {
        Record::new()
            .with("distributor_name", self.distributor_name.trim())
            .with("mobile", self.mobile.as_str())
            .with("address", self.address.trim())
            .with("target_area", self.target_area.trim())
            .with("pincode", self.pincode.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DistributorForm {
        DistributorForm {
            distributor_name: "Sharma Traders".into(),
            mobile: "9876543210".into(),
            address: "12 MG Road".into(),
            target_area: "North".into(),
            pincode: "110001".into(),
        }
    }

    #[test]
    fn valid_form_has_no_errors() {
        assert!(valid().validate().is_empty());
    }

    #[test]
    fn digit_fields_are_checked() {
        let form = DistributorForm {
            mobile: "987654321".into(),
            pincode: "11000".into(),
            ..valid()
        };
        let errors = form.validate();
        assert_eq!(errors.get("mobile"), Some(&"Mobile number must be 10 digits"));
        assert_eq!(errors.get("pincode"), Some(&"Pincode must be 6 digits"));

        let form = DistributorForm {
            mobile: "98765o3210".into(),
            ..valid()
        };
        assert!(form.validate().contains_key("mobile"));
    }

    #[test]
    fn blank_fields_are_required() {
        let errors = DistributorForm::default().validate();
        assert_eq!(errors.len(), 5);
        assert_eq!(errors.get("pincode"), Some(&"Pincode is required"));
    }
}

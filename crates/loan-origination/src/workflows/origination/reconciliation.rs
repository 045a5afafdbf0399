//! Diffing self-reported applicant data against the external profile captured at start.
//!
//! The snapshot is a baseline only. It is written once when the application is created and the
//! changed-field set is re-derived from scratch on every save, so reverting a value drops it
//! from the set again.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Applicant-editable fields. Document uploads and consents are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplicantField {
    FirstName,
    LastName,
    DateOfBirth,
    Sin,
    CitizenshipStatus,
    Email,
    Phone,
    StreetNumber,
    StreetName,
    Unit,
    City,
    Province,
    PostalCode,
    YearsAtAddress,
    MonthsAtAddress,
    EmployerName,
    EmploymentStatus,
    EmploymentYears,
    EmploymentMonths,
    AnnualIncome,
    OtherIncome,
    MonthlyHousingCost,
    OtherMonthlyDebts,
    NumberOfDependents,
    BankAccountBalance,
    InvestmentValue,
    PropertyValue,
    VehicleValue,
    CreditCardBalances,
    CreditCardLimits,
    PrimaryBank,
    AccountType,
    BankingYears,
}

/// How two values of a field are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Identity,
    Contact,
    Address,
    Employment,
    Income,
    Assets,
    Liabilities,
    Banking,
}

impl ApplicantField {
    pub const ALL: [Self; 33] = [
        Self::FirstName,
        Self::LastName,
        Self::DateOfBirth,
        Self::Sin,
        Self::CitizenshipStatus,
        Self::Email,
        Self::Phone,
        Self::StreetNumber,
        Self::StreetName,
        Self::Unit,
        Self::City,
        Self::Province,
        Self::PostalCode,
        Self::YearsAtAddress,
        Self::MonthsAtAddress,
        Self::EmployerName,
        Self::EmploymentStatus,
        Self::EmploymentYears,
        Self::EmploymentMonths,
        Self::AnnualIncome,
        Self::OtherIncome,
        Self::MonthlyHousingCost,
        Self::OtherMonthlyDebts,
        Self::NumberOfDependents,
        Self::BankAccountBalance,
        Self::InvestmentValue,
        Self::PropertyValue,
        Self::VehicleValue,
        Self::CreditCardBalances,
        Self::CreditCardLimits,
        Self::PrimaryBank,
        Self::AccountType,
        Self::BankingYears,
    ];

    /// Key used in request payloads and the serialized changed-field list.
    pub const fn key(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::DateOfBirth => "dateOfBirth",
            Self::Sin => "sin",
            Self::CitizenshipStatus => "citizenshipStatus",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::StreetNumber => "streetNumber",
            Self::StreetName => "streetName",
            Self::Unit => "unit",
            Self::City => "city",
            Self::Province => "province",
            Self::PostalCode => "postalCode",
            Self::YearsAtAddress => "yearsAtAddress",
            Self::MonthsAtAddress => "monthsAtAddress",
            Self::EmployerName => "employerName",
            Self::EmploymentStatus => "employmentStatus",
            Self::EmploymentYears => "employmentYears",
            Self::EmploymentMonths => "employmentMonths",
            Self::AnnualIncome => "annualIncome",
            Self::OtherIncome => "otherIncome",
            Self::MonthlyHousingCost => "monthlyHousingCost",
            Self::OtherMonthlyDebts => "otherMonthlyDebts",
            Self::NumberOfDependents => "numberOfDependents",
            Self::BankAccountBalance => "bankAccountBalance",
            Self::InvestmentValue => "investmentValue",
            Self::PropertyValue => "propertyValue",
            Self::VehicleValue => "vehicleValue",
            Self::CreditCardBalances => "creditCardBalances",
            Self::CreditCardLimits => "creditCardLimits",
            Self::PrimaryBank => "primaryBank",
            Self::AccountType => "accountType",
            Self::BankingYears => "bankingYears",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First Name",
            Self::LastName => "Last Name",
            Self::DateOfBirth => "Date of Birth",
            Self::Sin => "SIN",
            Self::CitizenshipStatus => "Citizenship Status",
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::StreetNumber => "Street Number",
            Self::StreetName => "Street Name",
            Self::Unit => "Unit",
            Self::City => "City",
            Self::Province => "Province",
            Self::PostalCode => "Postal Code",
            Self::YearsAtAddress => "Years at Address",
            Self::MonthsAtAddress => "Months at Address",
            Self::EmployerName => "Employer",
            Self::EmploymentStatus => "Employment Status",
            Self::EmploymentYears => "Years Employed",
            Self::EmploymentMonths => "Months Employed",
            Self::AnnualIncome => "Annual Income",
            Self::OtherIncome => "Other Income",
            Self::MonthlyHousingCost => "Monthly Housing Cost",
            Self::OtherMonthlyDebts => "Other Monthly Debts",
            Self::NumberOfDependents => "Dependents",
            Self::BankAccountBalance => "Bank Account Balance",
            Self::InvestmentValue => "Investments",
            Self::PropertyValue => "Property Value",
            Self::VehicleValue => "Vehicle Value",
            Self::CreditCardBalances => "Credit Card Balances",
            Self::CreditCardLimits => "Credit Card Limits",
            Self::PrimaryBank => "Primary Bank",
            Self::AccountType => "Account Type",
            Self::BankingYears => "Years with Bank",
        }
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::YearsAtAddress
            | Self::MonthsAtAddress
            | Self::EmploymentYears
            | Self::EmploymentMonths
            | Self::AnnualIncome
            | Self::OtherIncome
            | Self::MonthlyHousingCost
            | Self::OtherMonthlyDebts
            | Self::NumberOfDependents
            | Self::BankAccountBalance
            | Self::InvestmentValue
            | Self::PropertyValue
            | Self::VehicleValue
            | Self::CreditCardBalances
            | Self::CreditCardLimits
            | Self::BankingYears => FieldKind::Numeric,
            _ => FieldKind::Text,
        }
    }

    pub const fn group(self) -> FieldGroup {
        match self {
            Self::FirstName
            | Self::LastName
            | Self::DateOfBirth
            | Self::Sin
            | Self::CitizenshipStatus => FieldGroup::Identity,
            Self::Email | Self::Phone => FieldGroup::Contact,
            Self::StreetNumber
            | Self::StreetName
            | Self::Unit
            | Self::City
            | Self::Province
            | Self::PostalCode
            | Self::YearsAtAddress
            | Self::MonthsAtAddress => FieldGroup::Address,
            Self::EmployerName
            | Self::EmploymentStatus
            | Self::EmploymentYears
            | Self::EmploymentMonths => FieldGroup::Employment,
            Self::AnnualIncome | Self::OtherIncome => FieldGroup::Income,
            Self::BankAccountBalance
            | Self::InvestmentValue
            | Self::PropertyValue
            | Self::VehicleValue => FieldGroup::Assets,
            Self::MonthlyHousingCost
            | Self::OtherMonthlyDebts
            | Self::NumberOfDependents
            | Self::CreditCardBalances
            | Self::CreditCardLimits => FieldGroup::Liabilities,
            Self::PrimaryBank | Self::AccountType | Self::BankingYears => FieldGroup::Banking,
        }
    }
}

impl fmt::Display for ApplicantField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not an applicant-editable field")]
pub struct UnknownField(pub String);

impl FromStr for ApplicantField {
    type Err = UnknownField;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.key() == value)
            .ok_or_else(|| UnknownField(value.to_string()))
    }
}

/// Current values keyed by field. Absent means the applicant left it blank.
pub type FieldValues = BTreeMap<ApplicantField, String>;

/// Frozen copy of the external profile, used only as the diff baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub captured_at: DateTime<Utc>,
    pub values: FieldValues,
}

impl ProfileSnapshot {
    pub fn capture(values: FieldValues, captured_at: DateTime<Utc>) -> Self {
        let values = values
            .into_iter()
            .filter_map(|(field, raw)| normalize_text(&raw).map(|value| (field, value)))
            .collect();
        Self {
            captured_at,
            values,
        }
    }

    /// Baseline value for `field`; blank entries count as missing.
    pub fn baseline(&self, field: ApplicantField) -> Option<&str> {
        self.values
            .get(&field)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

/// Set of fields whose current value diverges from the snapshot.
///
/// Fields without a baseline are never reported, whatever the applicant typed.
pub fn reconcile(
    values: &FieldValues,
    snapshot: Option<&ProfileSnapshot>,
) -> BTreeSet<ApplicantField> {
    let Some(snapshot) = snapshot else {
        return BTreeSet::new();
    };

    ApplicantField::ALL
        .into_iter()
        .filter(|field| match snapshot.baseline(*field) {
            Some(original) => {
                let current = values.get(field).map(String::as_str).unwrap_or_default();
                !values_match(field.kind(), current, original)
            }
            None => false,
        })
        .collect()
}

fn values_match(kind: FieldKind, current: &str, original: &str) -> bool {
    if kind == FieldKind::Numeric {
        if let (Some(lhs), Some(rhs)) = (parse_numeric(current), parse_numeric(original)) {
            return (lhs - rhs).abs() < 1e-9;
        }
    }
    current.trim() == original.trim()
}

pub(crate) fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !matches!(ch, '$' | ',') && !ch.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Original and current value of one diverging field, for review screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: ApplicantField,
    pub label: &'static str,
    pub group: FieldGroup,
    pub original_value: String,
    pub current_value: Option<String>,
}

pub fn field_changes(
    values: &FieldValues,
    snapshot: Option<&ProfileSnapshot>,
    changed: &BTreeSet<ApplicantField>,
) -> Vec<FieldChange> {
    let Some(snapshot) = snapshot else {
        return Vec::new();
    };

    changed
        .iter()
        .filter_map(|field| {
            snapshot.baseline(*field).map(|original| FieldChange {
                field: *field,
                label: field.label(),
                group: field.group(),
                original_value: original.to_string(),
                current_value: values.get(field).cloned(),
            })
        })
        .collect()
}

/// A batch of edits from one save. `None` clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldEdits(pub BTreeMap<ApplicantField, Option<String>>);

impl FieldEdits {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn set(mut self, field: ApplicantField, value: impl Into<String>) -> Self {
        self.0.insert(field, Some(value.into()));
        self
    }

    pub fn clear(mut self, field: ApplicantField) -> Self {
        self.0.insert(field, None);
        self
    }

    /// Parse raw payload entries, rejecting unknown keys and malformed values.
    pub fn from_payload(payload: &BTreeMap<String, Value>) -> Result<Self, FieldEditError> {
        let mut edits = BTreeMap::new();
        for (key, raw) in payload {
            let field: ApplicantField = key
                .parse()
                .map_err(|UnknownField(key)| FieldEditError::UnknownField { key })?;
            edits.insert(field, normalize_value(field, raw)?);
        }
        Ok(Self(edits))
    }

    /// Apply onto `values`, returning the fields whose stored value actually changed.
    pub fn apply_to(&self, values: &mut FieldValues) -> BTreeSet<ApplicantField> {
        let mut touched = BTreeSet::new();
        for (field, value) in &self.0 {
            let previous = match value {
                Some(value) => values.insert(*field, value.clone()),
                None => values.remove(field),
            };
            if previous.as_ref() != value.as_ref() {
                touched.insert(*field);
            }
        }
        touched
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldEditError {
    #[error("'{key}' is not an applicant-editable field")]
    UnknownField { key: String },
    #[error("{field} must be a number")]
    NotNumeric { field: ApplicantField },
    #[error("{field} must be a string or number")]
    UnsupportedValue { field: ApplicantField },
}

impl FieldEditError {
    pub fn field_key(&self) -> String {
        match self {
            Self::UnknownField { key } => key.clone(),
            Self::NotNumeric { field } | Self::UnsupportedValue { field } => field.key().to_string(),
        }
    }
}

fn normalize_value(field: ApplicantField, raw: &Value) -> Result<Option<String>, FieldEditError> {
    let text = match raw {
        Value::Null => return Ok(None),
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return Err(FieldEditError::UnsupportedValue { field }),
    };

    let Some(text) = normalize_text(&text) else {
        return Ok(None);
    };

    if field.kind() == FieldKind::Numeric && parse_numeric(&text).is_none() {
        return Err(FieldEditError::NotNumeric { field });
    }

    Ok(Some(text))
}

/// External profile record as returned by the system of record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub values: FieldValues,
}

/// Capability for looking up a pre-existing profile by applicant identity.
pub trait ProfileSource: Send + Sync {
    fn fetch_profile(&self, identity: &str) -> Result<Option<ExternalProfile>, ProfileSourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileSourceError {
    #[error("profile source unavailable: {0}")]
    Unavailable(String),
}

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{DateTime, TimeZone, Utc};
use pg_common::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

//--------------------------------------      Identifiers      ---------------------------------------------------------
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| ConversionError(format!("Invalid {}: {s}. {e}", stringify!($name))))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

uuid_id!(
    /// The gateway's own identifier for a payment. Assigned by the ledger when the payment is first stored.
    PaymentId
);
uuid_id!(MerchantId);
uuid_id!(
    /// The identifier the settlement processor assigns to a payment once it accepts the charge.
    SettlementReference
);

//--------------------------------------   ValidationError     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Amount cannot be negative: {0}")]
    NegativeAmount(Amount),
    #[error("Currency is missing")]
    MissingCurrency,
    #[error("Validation method is missing")]
    MissingValidationMethod,
    #[error("Metadata is missing")]
    MissingMetadata,
    #[error("Card number is missing")]
    InvalidCardNumber,
    #[error("Cardholder name is missing")]
    InvalidCardName,
    #[error("Invalid card expiry date: {month:02}/{year}")]
    InvalidExpiry { month: u32, year: i32 },
    #[error("Card expired at the start of {month:02}/{year}")]
    CardExpired { month: u32, year: i32 },
    #[error("CVV must be between 0 and 999, got {0}")]
    InvalidCvv(i32),
    #[error("Settlement reference {0} already belongs to another payment")]
    ReferenceInUse(SettlementReference),
    #[error("The settlement reference of payment {0} has already been set and cannot change")]
    ReferenceImmutable(PaymentId),
}

//--------------------------------------        Card           ---------------------------------------------------------
/// A snapshot of the card details supplied with a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub number: String,
    pub name: String,
    pub expire_month: u32,
    pub expire_year: i32,
    pub cvv: i32,
}

impl Card {
    pub fn new<S: Into<String>>(number: S, name: S, expire_month: u32, expire_year: i32, cvv: i32) -> Self {
        Self { number: number.into(), name: name.into(), expire_month, expire_year, cvv }
    }

    /// Checks the card against the instant `now`.
    ///
    /// A card is considered expired as soon as its expiry month has started, i.e. a card with expiry `05/2030` is
    /// rejected from 2030-05-01T00:00:00Z onwards.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::InvalidCardName);
        }
        if self.number.is_empty() {
            return Err(ValidationError::InvalidCardNumber);
        }
        let (month, year) = (self.expire_month, self.expire_year);
        if !(1..=12).contains(&month) {
            return Err(ValidationError::InvalidExpiry { month, year });
        }
        let start_of_month = Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .ok_or(ValidationError::InvalidExpiry { month, year })?;
        if start_of_month < now {
            return Err(ValidationError::CardExpired { month, year });
        }
        if !(0..=999).contains(&self.cvv) {
            return Err(ValidationError::InvalidCvv(self.cvv));
        }
        Ok(())
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PaymentStatus {
    /// Stored by the gateway, not yet accepted by the settlement processor.
    Created,
    /// Accepted by the settlement processor. Waiting for the outcome.
    Pending,
    Success,
    Fail,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Fail)
    }

    /// Whether the payment lifecycle allows moving from `self` to `next`.
    ///
    /// | From \ To | Created | Pending | Success | Fail |
    /// |-----------|---------|---------|---------|------|
    /// | Created   | no      | yes     | no      | yes  |
    /// | Pending   | no      | no      | yes     | yes  |
    /// | Success   | no      | no      | no      | no   |
    /// | Fail      | no      | no      | no      | no   |
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!((self, next), (Created, Pending) | (Created, Fail) | (Pending, Success) | (Pending, Fail))
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Created => write!(f, "CREATED"),
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Success => write!(f, "SUCCESS"),
            PaymentStatus::Fail => write!(f, "FAIL"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAIL" => Ok(Self::Fail),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PaymentStatus> for String {
    fn from(value: PaymentStatus) -> Self {
        value.to_string()
    }
}

//--------------------------------------      NewPayment       ---------------------------------------------------------
/// A payment that has not been stored in the ledger yet, and so has no [`PaymentId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub merchant_id: MerchantId,
    pub amount: Amount,
    pub currency: String,
    pub purchase_time: DateTime<Utc>,
    pub validation_method: String,
    pub card: Card,
    pub metadata: String,
    pub status: PaymentStatus,
    pub settlement_reference: Option<SettlementReference>,
    pub settlement_sent_at: Option<DateTime<Utc>>,
    pub settlement_received_at: Option<DateTime<Utc>>,
    pub settlement_message: String,
}

impl NewPayment {
    /// Creates a new payment in the `Created` state, with no settlement details.
    pub fn new(
        merchant_id: MerchantId,
        amount: Amount,
        currency: &str,
        purchase_time: DateTime<Utc>,
        validation_method: &str,
        card: Card,
        metadata: &str,
    ) -> Self {
        Self {
            merchant_id,
            amount,
            currency: currency.to_string(),
            purchase_time,
            validation_method: validation_method.to_string(),
            card,
            metadata: metadata.to_string(),
            status: PaymentStatus::Created,
            settlement_reference: None,
            settlement_sent_at: None,
            settlement_received_at: None,
            settlement_message: String::default(),
        }
    }

    pub fn with_settlement_reference(mut self, reference: SettlementReference) -> Self {
        self.settlement_reference = Some(reference);
        self
    }

    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        validate_fields(&self.amount, &self.currency, &self.validation_method, &self.metadata)?;
        self.card.validate_at(now)
    }

    pub fn into_payment(self, id: PaymentId) -> Payment {
        Payment {
            id,
            merchant_id: self.merchant_id,
            amount: self.amount,
            currency: self.currency,
            purchase_time: self.purchase_time,
            validation_method: self.validation_method,
            card: self.card,
            metadata: self.metadata,
            status: self.status,
            settlement_reference: self.settlement_reference,
            settlement_sent_at: self.settlement_sent_at,
            settlement_received_at: self.settlement_received_at,
            settlement_message: self.settlement_message,
        }
    }
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub id: PaymentId,
    pub merchant_id: MerchantId,
    pub amount: Amount,
    pub currency: String,
    pub purchase_time: DateTime<Utc>,
    pub validation_method: String,
    pub card: Card,
    pub metadata: String,
    pub status: PaymentStatus,
    pub settlement_reference: Option<SettlementReference>,
    pub settlement_sent_at: Option<DateTime<Utc>>,
    pub settlement_received_at: Option<DateTime<Utc>>,
    pub settlement_message: String,
}

impl Payment {
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        validate_fields(&self.amount, &self.currency, &self.validation_method, &self.metadata)?;
        self.card.validate_at(now)
    }

    pub fn is_owned_by(&self, merchant_id: &MerchantId) -> bool {
        self.merchant_id == *merchant_id
    }
}

impl From<Payment> for NewPayment {
    fn from(p: Payment) -> Self {
        Self {
            merchant_id: p.merchant_id,
            amount: p.amount,
            currency: p.currency,
            purchase_time: p.purchase_time,
            validation_method: p.validation_method,
            card: p.card,
            metadata: p.metadata,
            status: p.status,
            settlement_reference: p.settlement_reference,
            settlement_sent_at: p.settlement_sent_at,
            settlement_received_at: p.settlement_received_at,
            settlement_message: p.settlement_message,
        }
    }
}

fn validate_fields(
    amount: &Amount,
    currency: &str,
    validation_method: &str,
    metadata: &str,
) -> Result<(), ValidationError> {
    if amount.is_negative() {
        return Err(ValidationError::NegativeAmount(*amount));
    }
    if currency.is_empty() {
        return Err(ValidationError::MissingCurrency);
    }
    if validation_method.is_empty() {
        return Err(ValidationError::MissingValidationMethod);
    }
    if metadata.is_empty() {
        return Err(ValidationError::MissingMetadata);
    }
    Ok(())
}

//--------------------------------------       Merchant        ---------------------------------------------------------
/// A merchant profile, as held by the merchant service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub username: String,
    pub name: String,
    pub active: bool,
    pub max_rate_per_second: i32,
}

//! Status and role enumerations shared by the lending models.
//!
//! Every enum is stored as upper-case text in the database and serialized
//! the same way over the API.

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

text_enum! {
    /// Account status. BLOCKED is derived from eligibility and reversible.
    UserStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Blocked => "BLOCKED",
    }
}

text_enum! {
    UserRole {
        User => "USER",
        Admin => "ADMIN",
    }
}

text_enum! {
    /// Lifecycle of a single checkout
    BorrowStatus {
        Borrowed => "BORROWED",
        Overdue => "OVERDUE",
        Returned => "RETURNED",
        Lost => "LOST",
    }
}

impl BorrowStatus {
    /// The copy is still out of the library
    pub fn is_active(&self) -> bool {
        matches!(self, BorrowStatus::Borrowed | BorrowStatus::Overdue)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BorrowStatus::Returned | BorrowStatus::Lost)
    }

    /// Forward-only transitions
    pub fn can_transition_to(&self, next: BorrowStatus) -> bool {
        use BorrowStatus::*;
        matches!(
            (self, next),
            (Borrowed, Overdue) | (Borrowed, Returned) | (Borrowed, Lost) | (Overdue, Returned) | (Overdue, Lost)
        )
    }
}

text_enum! {
    FineType {
        Overdue => "OVERDUE",
        Damage => "DAMAGE",
        Lost => "LOST",
    }
}

text_enum! {
    FineStatus {
        Pending => "PENDING",
        Paid => "PAID",
        Waived => "WAIVED",
    }
}

text_enum! {
    /// Waitlist entry status
    HoldStatus {
        Waiting => "WAITING",
        Ready => "READY",
        Fulfilled => "FULFILLED",
        Cancelled => "CANCELLED",
        Expired => "EXPIRED",
    }
}

impl HoldStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, HoldStatus::Waiting | HoldStatus::Ready)
    }

    pub fn can_cancel(&self) -> bool {
        !matches!(self, HoldStatus::Fulfilled | HoldStatus::Cancelled)
    }
}

text_enum! {
    ExtensionStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

text_enum! {
    BookRequestStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Fulfilled => "FULFILLED",
    }
}

impl BookRequestStatus {
    pub fn can_transition_to(&self, next: BookRequestStatus) -> bool {
        use BookRequestStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Fulfilled)
        )
    }
}

text_enum! {
    RoomBookingStatus {
        Confirmed => "CONFIRMED",
        Cancelled => "CANCELLED",
    }
}

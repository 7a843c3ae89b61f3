//! Miscellaneous utility macros and functions.

/// Implements lossless `u8` conversions for a fieldless enum, so that it
/// persists as an integer.
macro_rules! u8_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = crate::AuthorityError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                const VARIANTS: &[$name] = &[$($name::$variant),+];
                VARIANTS
                    .iter()
                    .copied()
                    .find(|variant| *variant as u8 == value)
                    .ok_or(crate::AuthorityError::InvalidDiscriminant {
                        kind: stringify!($name),
                        value,
                    })
            }
        }
    };
}

pub(crate) use u8_enum;

/// Distances closer than this are considered equal, in m.
pub(crate) const DISTANCE_EPSILON: f64 = 1e-6; // m

#[cfg(test)]
mod test {
    use crate::{AuthorityError, Direction};

    #[test]
    fn enum_discriminants() {
        assert_eq!(u8::from(Direction::Reverse), 1);
        assert_eq!(Direction::try_from(0), Ok(Direction::Forward));
        assert_eq!(
            Direction::try_from(7),
            Err(AuthorityError::InvalidDiscriminant {
                kind: "Direction",
                value: 7
            })
        );
    }
}

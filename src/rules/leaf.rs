//! Stock [`TokenParser`] implementations for the primitive member types.

use crate::errors::{Error, ErrorKind};
use crate::rules::TokenParser;
use crate::token::ScalarToken;

pub struct StringParser;

impl TokenParser for StringParser {
    type Output = String;

    fn parse(&self, token: &ScalarToken) -> Result<String, Error> {
        token.string_value()
    }
}

pub struct LongParser;

impl TokenParser for LongParser {
    type Output = i64;

    fn parse(&self, token: &ScalarToken) -> Result<i64, Error> {
        token.long_value()
    }
}

/// 32-bit integer parser. The coercion itself is 64-bit; a value outside
/// the i32 range is a distinct range error, not an illegal integer.
pub struct IntegerParser;

impl TokenParser for IntegerParser {
    type Output = i32;

    fn parse(&self, token: &ScalarToken) -> Result<i32, Error> {
        let value = token.long_value()?;
        i32::try_from(value).map_err(|_| {
            Error::at(ErrorKind::IntegerOutOfRange { value }, token.position())
        })
    }
}

pub struct DoubleParser;

impl TokenParser for DoubleParser {
    type Output = f64;

    fn parse(&self, token: &ScalarToken) -> Result<f64, Error> {
        token.double_value()
    }
}

pub struct BooleanParser;

impl TokenParser for BooleanParser {
    type Output = bool;

    fn parse(&self, token: &ScalarToken) -> Result<bool, Error> {
        token.boolean_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Position;
    use crate::token::Scalar;

    fn tok(value: Scalar) -> ScalarToken {
        ScalarToken::new(Some("field".into()), value, Position::start())
    }

    #[test]
    fn test_integer_parser_enforces_the_32_bit_range() {
        assert_eq!(IntegerParser.parse(&tok(Scalar::Long(7))).unwrap(), 7);
        assert_eq!(
            IntegerParser
                .parse(&tok(Scalar::Long(i32::MAX as i64)))
                .unwrap(),
            i32::MAX
        );
        let err = IntegerParser
            .parse(&tok(Scalar::Long(i32::MAX as i64 + 1)))
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::IntegerOutOfRange { value } if *value == i32::MAX as i64 + 1
        ));
        let err = IntegerParser
            .parse(&tok(Scalar::Str("abc".into())))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IllegalInteger { .. }));
    }

    #[test]
    fn test_long_parser_accepts_the_full_64_bit_range() {
        assert_eq!(
            LongParser.parse(&tok(Scalar::Long(i64::MAX))).unwrap(),
            i64::MAX
        );
        assert_eq!(
            LongParser
                .parse(&tok(Scalar::Str(i64::MIN.to_string())))
                .unwrap(),
            i64::MIN
        );
    }

    #[test]
    fn test_double_parser_widens_longs() {
        assert_eq!(DoubleParser.parse(&tok(Scalar::Long(3))).unwrap(), 3.0);
        assert_eq!(
            DoubleParser.parse(&tok(Scalar::Str("2.5".into()))).unwrap(),
            2.5
        );
    }

    #[test]
    fn test_boolean_parser_is_case_insensitive_for_strings() {
        assert!(BooleanParser.parse(&tok(Scalar::Bool(true))).unwrap());
        assert!(BooleanParser.parse(&tok(Scalar::Str("True".into()))).unwrap());
        assert!(!BooleanParser
            .parse(&tok(Scalar::Str("FALSE".into())))
            .unwrap());
        let err = BooleanParser.parse(&tok(Scalar::Long(1))).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IllegalBoolean { .. }));
    }
}

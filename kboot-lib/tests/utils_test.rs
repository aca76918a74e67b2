use kboot_lib::Error;
use kboot_lib::utils::{IntLiteralError, Utils};

#[test]
fn test_parse_int_bases() {
    assert_eq!(Utils::parse_int("1024"), Ok(1024));
    assert_eq!(Utils::parse_int("0x400"), Ok(0x400));
    assert_eq!(Utils::parse_int("0X1fF"), Ok(0x1FF));
    assert_eq!(Utils::parse_int("0o17"), Ok(0o17));
    assert_eq!(Utils::parse_int("0b1010"), Ok(0b1010));
    assert_eq!(Utils::parse_int("0"), Ok(0));
    assert_eq!(Utils::parse_int("00"), Ok(0));
    assert_eq!(Utils::parse_int(" +42 "), Ok(42));
}

#[test]
fn test_parse_int_separators() {
    assert_eq!(Utils::parse_int("1_000"), Ok(1000));
    assert_eq!(Utils::parse_int("0x_FFFF_0000"), Ok(0xFFFF_0000));
    assert_eq!(Utils::parse_int("1__0"), Err(IntLiteralError::Separator));
    assert_eq!(Utils::parse_int("10_"), Err(IntLiteralError::Separator));
}

#[test]
fn test_parse_int_rejects_malformed() {
    assert_eq!(Utils::parse_int(""), Err(IntLiteralError::Empty));
    assert_eq!(Utils::parse_int("0x"), Err(IntLiteralError::Empty));
    assert_eq!(Utils::parse_int("-1"), Err(IntLiteralError::Negative));
    assert_eq!(Utils::parse_int("abc"), Err(IntLiteralError::InvalidDigit('a')));
    assert_eq!(Utils::parse_int("0b102"), Err(IntLiteralError::InvalidDigit('2')));
    assert_eq!(Utils::parse_int("017"), Err(IntLiteralError::LeadingZero));
    assert_eq!(
        Utils::parse_int("0x1_0000_0000_0000_0000"),
        Err(IntLiteralError::Overflow)
    );
}

#[test]
fn test_parse_u32_bounds() {
    assert_eq!(Utils::parse_u32("address", "0xFFFFFFFF").unwrap(), u32::MAX);

    let err = Utils::parse_u32("length", "0x100000000").unwrap_err();
    assert!(matches!(err, Error::ArgumentInvalid(_)));
    assert!(err.to_string().contains("length"));

    let err = Utils::parse_u32("address", "zero").unwrap_err();
    assert!(matches!(err, Error::ArgumentInvalid(_)));
}

#[test]
fn test_parse_u16_bounds() {
    assert_eq!(Utils::parse_u16("vid", "0x15A2").unwrap(), 0x15A2);
    assert!(matches!(
        Utils::parse_u16("pid", "0x10000"),
        Err(Error::ArgumentInvalid(_))
    ));
}

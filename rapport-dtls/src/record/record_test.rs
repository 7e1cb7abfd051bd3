use super::*;

#[test]
fn test_record_header_round_trip() {
    let record = Record::new(ContentType::Handshake, 0, 42, b"body".to_vec());
    let raw = record.marshal();
    assert_eq!(raw.len(), RECORD_HEADER_SIZE + 4);

    let mut buf = &raw[..];
    let header = RecordHeader::unmarshal(&mut buf).unwrap();
    assert_eq!(header.content_type, ContentType::Handshake);
    assert_eq!(header.version, crate::PROTOCOL_VERSION);
    assert_eq!(header.epoch, 0);
    assert_eq!(header.sequence_number, 42);
    assert_eq!(header.length, 4);
    assert_eq!(buf, b"body");
}

#[test]
fn test_sequence_number_is_48_bits() {
    let record = Record::new(ContentType::ApplicationData, 1, (1 << 48) - 1, vec![]);
    let raw = record.marshal();
    let mut buf = &raw[..];
    let header = RecordHeader::unmarshal(&mut buf).unwrap();
    assert_eq!(header.sequence_number, (1 << 48) - 1);
}

#[test]
fn test_split_records_multiple() {
    let mut datagram = Record::new(ContentType::Handshake, 0, 0, vec![1, 2, 3]).marshal();
    datagram.extend(Record::new(ContentType::ChangeCipherSpec, 0, 1, vec![1]).marshal());

    let records = split_records(&datagram).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].1, vec![1, 2, 3]);
    assert_eq!(records[1].0.content_type, ContentType::ChangeCipherSpec);
}

#[test]
fn test_split_records_rejects_truncated() {
    let mut datagram = Record::new(ContentType::Handshake, 0, 0, vec![0; 32]).marshal();
    datagram.truncate(datagram.len() - 1);
    assert!(split_records(&datagram).is_err());
}

#[test]
fn test_unknown_content_type_rejected() {
    let mut datagram = Record::new(ContentType::Alert, 0, 0, vec![1, 0]).marshal();
    datagram[0] = 99;
    assert!(split_records(&datagram).is_err());
}

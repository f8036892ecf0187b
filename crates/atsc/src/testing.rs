//! テスト用にPSIPのセクションやTSパケットを組み立てる。

use crate::packet::PACKET_SIZE;

/// セクションシンタクスを持つセクションを組み立てる。CRC_32も付加する。
pub fn section(table_id: u8, table_id_extension: u16, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    assert!(section_length <= 0x0FFF);

    let mut sec = vec![
        table_id,
        // section_syntax_indicator、private_indicator、reserved
        0xF0 | (section_length >> 8) as u8,
        section_length as u8,
    ];
    sec.extend_from_slice(&table_id_extension.to_be_bytes());
    // reserved、version_number = 0、current_next_indicator = 1
    sec.push(0xC1);
    // section_number、last_section_number
    sec.extend_from_slice(&[0x00, 0x00]);
    sec.extend_from_slice(body);

    let crc = crate::crc32::checksum32(&sec);
    sec.extend_from_slice(&crc.to_be_bytes());
    sec
}

/// MGTを組み立てる。
pub fn mgt(tables: &[(u16, u16)]) -> Vec<u8> {
    // protocol_version
    let mut body = vec![0x00];
    body.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    for &(table_type, pid) in tables {
        body.extend_from_slice(&table_type.to_be_bytes());
        body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
        // reserved、table_type_version_number
        body.push(0xE0);
        // number_bytes
        body.extend_from_slice(&0x0100_u32.to_be_bytes());
        // reserved、table_type_descriptors_length
        body.extend_from_slice(&[0xF0, 0x00]);
    }
    // reserved、descriptors_length
    body.extend_from_slice(&[0xF0, 0x00]);

    section(0xC7, 0x0000, &body)
}

/// VCTのチャンネル。
pub struct Channel<'a> {
    pub short_name: &'a str,
    pub major: u16,
    pub minor: u16,
    pub program_number: u16,
    pub source_id: u16,
}

/// 地上波VCTを組み立てる。
pub fn tvct(channels: &[Channel]) -> Vec<u8> {
    // protocol_version、num_channels_in_section
    let mut body = vec![0x00, channels.len() as u8];
    for ch in channels {
        let mut name = [0_u8; 14];
        for (i, unit) in ch.short_name.encode_utf16().take(7).enumerate() {
            name[i * 2..i * 2 + 2].copy_from_slice(&unit.to_be_bytes());
        }
        body.extend_from_slice(&name);

        // reserved(4) + major(10) + minor(10)
        let packed = 0xF0_0000 | (ch.major as u32 & 0x3FF) << 10 | (ch.minor as u32 & 0x3FF);
        body.extend_from_slice(&packed.to_be_bytes()[1..]);
        // modulation_mode
        body.push(0x04);
        // carrier_frequency
        body.extend_from_slice(&[0; 4]);
        // channel_TSID
        body.extend_from_slice(&0x0001_u16.to_be_bytes());
        body.extend_from_slice(&ch.program_number.to_be_bytes());
        // ETM_location、access_controlled、hidden、hide_guide、service_type
        body.extend_from_slice(&[0x0D, 0xC2]);
        body.extend_from_slice(&ch.source_id.to_be_bytes());
        // reserved、descriptors_length
        body.extend_from_slice(&[0xFC, 0x00]);
    }
    // reserved、additional_descriptors_length
    body.extend_from_slice(&[0xFC, 0x00]);

    section(0xC8, 0x0001, &body)
}

/// 単一言語・単一セグメントの文字列構造を組み立てる。
pub fn multiple_string(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    // number_strings、ISO_639_language_code、number_segments
    let mut mss = vec![0x01, b'e', b'n', b'g', 0x01];
    // compression_type、mode、number_bytes
    mss.extend_from_slice(&[0x00, 0x00, bytes.len() as u8]);
    mss.extend_from_slice(bytes);
    mss
}

/// EITのイベント。
pub struct Event<'a> {
    pub event_id: u16,
    pub title: &'a str,
    pub start_time: u32,
    pub duration: u32,
}

/// EITを組み立てる。
pub fn eit(source_id: u16, events: &[Event]) -> Vec<u8> {
    // protocol_version、num_events_in_section
    let mut body = vec![0x00, events.len() as u8];
    for ev in events {
        body.extend_from_slice(&(0xC000 | ev.event_id).to_be_bytes());
        body.extend_from_slice(&ev.start_time.to_be_bytes());
        // reserved、ETM_location、length_in_seconds
        body.extend_from_slice(&(0xC0_0000 | ev.duration & 0x0F_FFFF).to_be_bytes()[1..]);
        let title = multiple_string(ev.title);
        body.push(title.len() as u8);
        body.extend_from_slice(&title);
        // reserved、descriptors_length
        body.extend_from_slice(&[0xF0, 0x00]);
    }

    section(0xCB, source_id, &body)
}

/// `sections`を連続したセクション列として`pid`のTSパケットに詰める。
///
/// セクションの始まるパケットにはペイロードユニット開始インジケーターとポインターを設定し、
/// 末尾はスタッフィングで埋める。
pub fn packetize(pid: u16, cc: &mut u8, sections: &[Vec<u8>]) -> Vec<u8> {
    let mut starts = Vec::new();
    let mut stream = Vec::new();
    for sec in sections {
        starts.push(stream.len());
        stream.extend_from_slice(sec);
    }

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < stream.len() {
        let mut packet = vec![0x47, (pid >> 8) as u8 & 0x1F, pid as u8, 0x10 | *cc];

        let mut end = if let Some(&start) = starts.iter().find(|&&s| s >= pos && s < pos + 183) {
            packet[1] |= 0x40;
            packet.push((start - pos) as u8);
            pos + 183
        } else {
            // 開始インジケーターのないパケットにセクションの先頭を含めない
            let next = starts.iter().copied().find(|&s| s > pos);
            next.map_or(pos + 184, |next| std::cmp::min(next, pos + 184))
        };
        end = std::cmp::min(end, stream.len());

        packet.extend_from_slice(&stream[pos..end]);
        packet.resize(PACKET_SIZE, 0xFF);
        out.extend_from_slice(&packet);

        pos = end;
        *cc = (*cc + 1) & 0x0F;
    }
    out
}

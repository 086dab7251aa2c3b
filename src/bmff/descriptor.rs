use crate::iter::hex_digit;

// Extracts the MIME codec string from esds box data by walking the
// MPEG-4 descriptor chain to the Object Type Indication and the audio
// configuration. Returns a string like "40.2" for AAC-LC, or None when
// the chain is malformed.
#[must_use]
pub fn read_esds_codec(data: &[u8]) -> Option<String> {
    // ESDescriptor (tag 0x03).
    if *data.first()? != 0x03 {
        return None;
    }
    let mut ptr = skip_descriptor_len(data, 1)?;

    // ES_ID (2 bytes) + stream dependency flags (1 byte).
    let flags = *data.get(ptr + 2)?;
    ptr += 3;

    // Optional fields gated by the flags.
    if flags & 0x80 != 0 {
        // streamDependenceFlag
        ptr += 2;
    }
    if flags & 0x40 != 0 {
        // URL_Flag: length-prefixed URL string.
        let url_len = usize::from(*data.get(ptr)?);
        ptr += 1 + url_len;
    }
    if flags & 0x20 != 0 {
        // OCRstreamFlag
        ptr += 2;
    }

    // DecoderConfigDescriptor (tag 0x04).
    if *data.get(ptr)? != 0x04 {
        return None;
    }
    ptr = skip_descriptor_len(data, ptr + 1)?;

    let oti = *data.get(ptr)?;
    if oti == 0 {
        return None;
    }
    let oti_str = hex_byte(oti);

    // Skip the fixed header to DecoderSpecificInfo:
    // oti(1) + stream_type(1) + buffer_size_db(3) + max_bitrate(4) + avg_bitrate(4).
    ptr += 13;

    if data.get(ptr) != Some(&0x05) {
        // No DecoderSpecificInfo, return just the OTI.
        return Some(oti_str);
    }
    ptr = skip_descriptor_len(data, ptr + 1)?;

    // Audio object type from the top 5 bits of the first config byte.
    let Some(&config0) = data.get(ptr) else {
        return Some(oti_str);
    };
    let audio_object_type = (config0 & 0xf8) >> 3;
    if audio_object_type == 0 {
        return Some(oti_str);
    }
    Some(format!("{oti_str}.{audio_object_type}"))
}

// Lowercase hex without a leading zero for values below 16.
fn hex_byte(b: u8) -> String {
    let mut s = String::with_capacity(2);
    if b >= 16 {
        s.push(char::from(hex_digit(b >> 4)));
    }
    s.push(char::from(hex_digit(b)));
    s
}

// Skips the variable-length descriptor length field: each length byte
// with the top bit set means another length byte follows.
fn skip_descriptor_len(data: &[u8], mut ptr: usize) -> Option<usize> {
    while ptr < data.len() {
        let b = data[ptr];
        ptr += 1;
        if b & 0x80 == 0 {
            return Some(ptr);
        }
    }
    None
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use modepage_core::tables::{SAS_ENHANCED_PHY_DESCRIPTORS, SAS_PHY_DESCRIPTORS};
use modepage_core::{
    get_bits_with_sentinel, render_signed, set_bits, DescriptorBlock, DescriptorCount,
    DescriptorStride, FieldDescriptor, ModeHeader,
};

const BYTE_LENGTH: DescriptorBlock = DescriptorBlock {
    first_offset: 8,
    count: DescriptorCount::ByteLength {
        offset: 2,
        width: 2,
        base_adjustment: 4,
    },
    stride: DescriptorStride::Variable {
        len_offset: 2,
        len_width: 2,
    },
    id_offset: Some(0),
    name: "fuzzed",
};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let (control, page) = data.split_at(3);
    let start_bit = control[0] & 0x07;
    let width = control[1] % 65;
    let start_byte = usize::from(control[2]);

    for six_byte in [true, false] {
        let _ = ModeHeader::parse(page, six_byte);
    }

    for block in [SAS_PHY_DESCRIPTORS, SAS_ENHANCED_PHY_DESCRIPTORS, BYTE_LENGTH] {
        let Ok(instances) = block.instances(page) else {
            continue;
        };
        let field = FieldDescriptor::raw(0x19, 1, start_byte, start_bit, width.max(1));
        for k in 0..instances.len() {
            if let Some(offset) = instances.offset_of(&field, k) {
                let _ = instances.applies(&field, k);
                let _ = get_bits_with_sentinel(page, offset, start_bit, width);
            }
        }
    }

    let mut scratch = page.to_vec();
    if let Ok((value, _)) = get_bits_with_sentinel(&scratch, start_byte, start_bit, width) {
        let _ = render_signed(value, width, control[0] & 0x80 != 0);
        let written = set_bits(value, &mut scratch, start_byte, start_bit, width);
        assert!(written.is_ok());
        assert_eq!(scratch, page);
    }
});

//! Descriptor resolution over arbitrary page bytes.

use bitflags as _;
use log as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

use modepage_core::tables::{SAS_ENHANCED_PHY_DESCRIPTORS, SAS_PHY_DESCRIPTORS};
use modepage_core::{
    DescriptorBlock, DescriptorCount, DescriptorStride, FieldDescriptor, MAX_DESCRIPTOR_COUNT,
};
use proptest::prelude::*;

const WALKED: DescriptorBlock = DescriptorBlock {
    first_offset: 4,
    count: DescriptorCount::UntilPageEnd,
    stride: DescriptorStride::Variable {
        len_offset: 0,
        len_width: 1,
    },
    id_offset: Some(1),
    name: "walked",
};

proptest! {
    #[test]
    fn walks_stay_inside_the_page(page in proptest::collection::vec(any::<u8>(), 0..600)) {
        for block in [SAS_PHY_DESCRIPTORS, SAS_ENHANCED_PHY_DESCRIPTORS, WALKED] {
            if let Ok(instances) = block.instances(&page) {
                prop_assert!(instances.len() >= 1);
                prop_assert!(instances.len() <= MAX_DESCRIPTOR_COUNT);
                if let DescriptorStride::Variable { .. } = block.stride {
                    for k in 1..instances.len() {
                        let start = instances.start_of(k).unwrap_or_default();
                        prop_assert!(start < page.len());
                        prop_assert!(start > instances.start_of(k - 1).unwrap_or_default());
                    }
                }
            }
        }
    }

    #[test]
    fn fixed_stride_offsets_are_linear(count in 2u8..=8, k in 0usize..8, byte in 8usize..56) {
        let k = k % usize::from(count);
        let mut page = vec![0u8; 8 + 48 * usize::from(count)];
        page[0] = 0x59;
        page[1] = 0x01;
        page[7] = count;
        let instances = SAS_PHY_DESCRIPTORS.instances(&page).expect("plausible count");
        let field = FieldDescriptor::raw(0x19, 1, byte, 7, 8);
        prop_assert_eq!(instances.offset_of(&field, k), Some(byte + 48 * k));
    }
}

//! Sampler types and descriptors.

/// How texture coordinates outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Tile the texture.
    Repeat,
    /// Tile the texture, mirroring every other repetition.
    MirrorRepeat,
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Clamp to the border color.
    ClampToBorder,
}

impl AddressMode {
    /// Three-bit code used when packing sampler ids.
    const fn code(self) -> u32 {
        match self {
            Self::Repeat => 1,
            Self::MirrorRepeat => 2,
            Self::ClampToEdge => 3,
            Self::ClampToBorder => 4,
        }
    }
}

/// Texel filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// Comparison function for depth testing and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    const fn code(self) -> u32 {
        match self {
            Self::Never => 1,
            Self::Less => 2,
            Self::Equal => 3,
            Self::LessEqual => 4,
            Self::Greater => 5,
            Self::NotEqual => 6,
            Self::GreaterEqual => 7,
            Self::Always => 8,
        }
    }
}

/// Descriptor for creating a sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    /// Debug label for the sampler.
    pub label: Option<String>,
    /// Address mode for U coordinate.
    pub address_mode_u: AddressMode,
    /// Address mode for V coordinate.
    pub address_mode_v: AddressMode,
    /// Address mode for W coordinate.
    pub address_mode_w: AddressMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Mipmap filter.
    pub mipmap_filter: FilterMode,
    /// Comparison function for depth sampling.
    pub compare: Option<CompareFunction>,
    /// Maximum anisotropy level.
    pub anisotropy_clamp: u8,
}

impl SamplerDescriptor {
    /// Create a new sampler descriptor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a linear filtering sampler.
    pub fn linear() -> Self {
        Self {
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Default::default()
        }
    }

    /// Create a nearest neighbor filtering sampler.
    pub fn nearest() -> Self {
        Self {
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        }
    }

    /// The sampler used for immutable pipeline samplers: point filtering, wrap addressing.
    pub fn point_wrap() -> Self {
        Self::nearest()
            .with_address_mode(AddressMode::Repeat)
            .with_label("Default sampler")
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set address mode for all coordinates.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }

    /// Set comparison function for depth sampling.
    pub fn with_compare(mut self, compare: CompareFunction) -> Self {
        self.compare = Some(compare);
        self
    }

    /// Set anisotropic filtering level.
    pub fn with_anisotropy(mut self, level: u8) -> Self {
        self.anisotropy_clamp = level;
        self
    }

    /// Pack the filter and address state into the sampler cache key.
    ///
    /// Address modes occupy the low nine bits as `u << 6 | v << 3 | w`,
    /// followed by one bit per filter, four bits of compare function and
    /// eight bits of anisotropy. The label does not participate.
    pub fn packed_id(&self) -> u32 {
        let address = self.address_mode_u.code() << 6
            | self.address_mode_v.code() << 3
            | self.address_mode_w.code();
        let filters = (self.min_filter as u32) << 9
            | (self.mag_filter as u32) << 10
            | (self.mipmap_filter as u32) << 11;
        let compare = self.compare.map_or(0, CompareFunction::code) << 12;
        let anisotropy = u32::from(self.anisotropy_clamp) << 16;
        address | filters | compare | anisotropy
    }
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            compare: None,
            anisotropy_clamp: 1,
        }
    }
}

//! 命名枚举上的类型化位集合。
//!
//! # 设计动机（Why）
//! - 选路结果的 `routeBitmap` 与连接能力标志在下游仍以整数交付，但在引擎内部若直接对整数做按位或，
//!   极易写错位号；`FlagSet<F>` 把“哪些位合法”固化在类型里。
//!
//! # 契约说明（What）
//! - [`Flag::bit`] 返回单个位的掩码，必须是 2 的幂；
//! - [`FlagSet::bits`] 给出交付给下游的原始整数，[`FlagSet::from_bits`] 丢弃未定义的位。

use core::fmt;
use core::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 可放入 [`FlagSet`] 的命名标志。
pub trait Flag: Copy + fmt::Debug + 'static {
    /// 所有已定义标志，按位号升序。
    const ALL: &'static [Self];

    /// 该标志对应的位掩码。
    fn bit(self) -> u8;
}

/// 基于 `u8` 的类型化位集合。
pub struct FlagSet<F: Flag> {
    bits: u8,
    _marker: PhantomData<F>,
}

impl<F: Flag> FlagSet<F> {
    /// 空集合。
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    /// 由原始整数构造，未定义的位被丢弃。
    pub fn from_bits(raw: u8) -> Self {
        let mask = F::ALL.iter().fold(0u8, |acc, flag| acc | flag.bit());
        Self {
            bits: raw & mask,
            _marker: PhantomData,
        }
    }

    /// 插入一个标志。
    pub fn insert(&mut self, flag: F) {
        self.bits |= flag.bit();
    }

    /// 以构建器风格插入标志。
    #[must_use]
    pub fn with(mut self, flag: F) -> Self {
        self.insert(flag);
        self
    }

    /// 是否包含某个标志。
    pub fn contains(&self, flag: F) -> bool {
        self.bits & flag.bit() != 0
    }

    /// 集合是否为空。
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// 交付给下游的原始整数。
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// 按位号升序迭代已置位的标志。
    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        F::ALL.iter().copied().filter(|flag| self.contains(*flag))
    }
}

impl<F: Flag> Clone for FlagSet<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: Flag> Copy for FlagSet<F> {}

impl<F: Flag> PartialEq for FlagSet<F> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<F: Flag> Eq for FlagSet<F> {}

impl<F: Flag> Default for FlagSet<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F: Flag> fmt::Debug for FlagSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<F: Flag> FromIterator<F> for FlagSet<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, flag| set.with(flag))
    }
}

impl<F: Flag> Serialize for FlagSet<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits)
    }
}

impl<'de, F: Flag> Deserialize<'de> for FlagSet<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(Self::from_bits)
    }
}

/// 选路结果中记录“哪些流量描述符条件参与了命中”的标志。
///
/// 位号与下游 `routeBitmap` 约定一致。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RouteFlag {
    /// bit0：命中的规则为 match-all。
    MatchAll,
    /// bit1：DNN 条件参与命中。
    DnnMatched,
    /// bit2：FQDN 条件参与命中。
    FqdnMatched,
    /// bit3：当前网络存在 URSP 策略。
    HasUrsp,
    /// bit4：连接能力条件参与命中。
    CctMatched,
}

impl Flag for RouteFlag {
    const ALL: &'static [Self] = &[
        Self::MatchAll,
        Self::DnnMatched,
        Self::FqdnMatched,
        Self::HasUrsp,
        Self::CctMatched,
    ];

    fn bit(self) -> u8 {
        match self {
            Self::MatchAll => 0x01,
            Self::DnnMatched => 0x02,
            Self::FqdnMatched => 0x04,
            Self::HasUrsp => 0x08,
            Self::CctMatched => 0x10,
        }
    }
}

/// 流量描述符中的连接能力（connection capability）取值。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionCapability {
    /// IMS 语音/消息业务。
    Ims,
    /// 彩信。
    Mms,
    /// SUPL 定位。
    Supl,
    /// 普通互联网。
    Internet,
}

impl ConnectionCapability {
    /// 由配置文件中的名称解析，大小写不敏感。
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|capability| capability.name().eq_ignore_ascii_case(name))
    }

    /// 配置文件使用的名称。
    pub fn name(self) -> &'static str {
        match self {
            Self::Ims => "ims",
            Self::Mms => "mms",
            Self::Supl => "supl",
            Self::Internet => "internet",
        }
    }
}

impl Flag for ConnectionCapability {
    const ALL: &'static [Self] = &[Self::Ims, Self::Mms, Self::Supl, Self::Internet];

    fn bit(self) -> u8 {
        match self {
            Self::Ims => 0x01,
            Self::Mms => 0x02,
            Self::Supl => 0x04,
            Self::Internet => 0x08,
        }
    }
}

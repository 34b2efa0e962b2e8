/// 内存中缓存的规模
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 块缓存个数
    pub buffers: usize,
    /// 内存索引节点表的容量
    pub inodes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            buffers: 6,
            inodes: 16,
        }
    }
}

/// 格式化时卷的布局参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// 卷的总块数
    pub size: u16,
    /// 索引节点个数
    pub ninodes: u16,
    /// 日志区块数
    pub nlog: u16,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            size: 1000,
            ninodes: 200,
            nlog: 6,
        }
    }
}

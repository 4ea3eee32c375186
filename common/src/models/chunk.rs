/// Khoảng block đóng [from, to] xử lý trong một lần gọi getLogs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub from: u64,
    pub to: u64,
}

impl ChunkRange {
    /// Số block trong chunk
    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }
}

/// Chia [from, end] thành các chunk liên tiếp, không chồng lấn, chunk cuối bị cắt tại `end`
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    next: Option<u64>,
    end: u64,
    size: u64,
}

impl ChunkPlan {
    pub fn new(from: u64, end: u64, size: u64) -> Self {
        Self {
            next: Some(from),
            end,
            size: size.max(1),
        }
    }

    /// Số chunk còn lại
    pub fn remaining(&self) -> u64 {
        match self.next {
            Some(next) if next <= self.end => (self.end - next) / self.size + 1,
            _ => 0,
        }
    }
}

impl Iterator for ChunkPlan {
    type Item = ChunkRange;

    fn next(&mut self) -> Option<ChunkRange> {
        let from = self.next?;
        if from > self.end {
            self.next = None;
            return None;
        }

        let to = from.saturating_add(self.size - 1).min(self.end);
        self.next = to.checked_add(1);
        Some(ChunkRange { from, to })
    }
}

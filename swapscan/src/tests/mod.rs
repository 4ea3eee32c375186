//! Test dùng chung: chain giả và các kịch bản quét end-to-end

// crates/cn_runtime/src/transport.rs

//! 消息传输与两阶段屏障
//!
//! 工作者之间只通过点对点消息通信。[`Transport`] 把屏障协议与具体
//! 传输解耦，使协议本身可以脱离线程单独测试；[`ChannelTransport`]
//! 是进程内 mpsc 通道上的实现。
//!
//! # 协议
//!
//! 1. **开始屏障**: 每个工作者向协调者发送 `Ready`，协调者集齐后
//!    统一广播 `Go`——昂贵的预处理只在整个编队都活着之后才开始。
//! 2. **结束屏障**: 每个工作者完成后发送 `Done`（携带其分片路径），
//!    协调者集齐后执行合并。
//!
//! 屏障处收到任何预期之外的消息都是致命的协议错误。

use cn_foundation::{CnError, CnResult};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};

/// 工作者之间的控制消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// 工作者已就绪（开始屏障）
    Ready {
        /// 发送方编号
        rank: usize,
    },
    /// 协调者放行（开始屏障）
    Go,
    /// 工作者完成（结束屏障），携带其分片路径
    Done {
        /// 发送方编号
        rank: usize,
        /// 该工作者的分片路径
        shard: PathBuf,
    },
    /// 致命错误的尽力广播
    Abort {
        /// 发送方编号
        rank: usize,
        /// 中止原因
        reason: String,
    },
}

/// 点对点消息传输
pub trait Transport: Send {
    /// 向指定编号发送消息
    fn send(&self, to: usize, message: Message) -> CnResult<()>;
    /// 阻塞接收下一条消息
    fn recv(&self) -> CnResult<Message>;
    /// 自己的编号（0 为协调者）
    fn rank(&self) -> usize;
    /// 编队大小
    fn size(&self) -> usize;
}

/// 进程内 mpsc 通道传输
pub struct ChannelTransport {
    rank: usize,
    senders: Vec<Sender<Message>>,
    receiver: Receiver<Message>,
}

impl ChannelTransport {
    /// 创建一个 `size` 人编队的全部传输端点
    ///
    /// 返回的向量按编号排列，每个端点移交给对应的工作者线程。
    #[must_use]
    pub fn create_group(size: usize) -> Vec<ChannelTransport> {
        let mut senders = Vec::with_capacity(size);
        let mut receivers = Vec::with_capacity(size);
        for _ in 0..size {
            let (tx, rx) = channel();
            senders.push(tx);
            receivers.push(rx);
        }
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| ChannelTransport {
                rank,
                senders: senders.clone(),
                receiver,
            })
            .collect()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, to: usize, message: Message) -> CnResult<()> {
        let sender = self.senders.get(to).ok_or_else(|| {
            CnError::protocol(format!("目标编号 {to} 超出编队大小 {}", self.size()))
        })?;
        sender
            .send(message)
            .map_err(|_| CnError::protocol(format!("到 {to} 的通道已关闭")))
    }

    fn recv(&self) -> CnResult<Message> {
        self.receiver
            .recv()
            .map_err(|_| CnError::protocol("接收通道已关闭".to_string()))
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }
}

// ============================================================
// 两阶段屏障
// ============================================================

/// 开始屏障：ready/go 握手
///
/// 工作者发送 `Ready` 后阻塞等待 `Go`；协调者收齐所有 `Ready` 后
/// 统一放行。收到 `Abort` 返回中止错误，其余消息是协议错误。
pub fn start_barrier(transport: &dyn Transport) -> CnResult<()> {
    let size = transport.size();
    if transport.rank() == 0 {
        let mut seen = vec![false; size];
        for _ in 1..size {
            match transport.recv()? {
                Message::Ready { rank } if rank > 0 && rank < size && !seen[rank] => {
                    seen[rank] = true;
                }
                Message::Abort { rank, reason } => {
                    return Err(CnError::Aborted {
                        reason: format!("worker {rank}: {reason}"),
                    });
                }
                other => {
                    return Err(CnError::protocol(format!(
                        "开始屏障收到意外消息: {other:?}"
                    )));
                }
            }
        }
        for peer in 1..size {
            transport.send(peer, Message::Go)?;
        }
        Ok(())
    } else {
        transport.send(
            0,
            Message::Ready {
                rank: transport.rank(),
            },
        )?;
        match transport.recv()? {
            Message::Go => Ok(()),
            Message::Abort { rank, reason } => Err(CnError::Aborted {
                reason: format!("worker {rank}: {reason}"),
            }),
            other => Err(CnError::protocol(format!(
                "等待放行时收到意外消息: {other:?}"
            ))),
        }
    }
}

/// 结束屏障：完成汇报
///
/// 工作者发送 `Done` 后返回 `None`；协调者收齐所有 `Done` 后返回
/// 按编号排列的全部分片路径（含自己的）。
pub fn end_barrier(
    transport: &dyn Transport,
    my_shard: PathBuf,
) -> CnResult<Option<Vec<PathBuf>>> {
    let size = transport.size();
    if transport.rank() == 0 {
        let mut shards: Vec<Option<PathBuf>> = vec![None; size];
        shards[0] = Some(my_shard);
        for _ in 1..size {
            match transport.recv()? {
                Message::Done { rank, shard }
                    if rank > 0 && rank < size && shards[rank].is_none() =>
                {
                    tracing::debug!("worker {rank} done, shard {}", shard.display());
                    shards[rank] = Some(shard);
                }
                Message::Abort { rank, reason } => {
                    return Err(CnError::Aborted {
                        reason: format!("worker {rank}: {reason}"),
                    });
                }
                other => {
                    return Err(CnError::protocol(format!(
                        "结束屏障收到意外消息: {other:?}"
                    )));
                }
            }
        }
        let shards = shards
            .into_iter()
            .map(|s| s.expect("all ranks reported"))
            .collect();
        Ok(Some(shards))
    } else {
        transport.send(
            0,
            Message::Done {
                rank: transport.rank(),
                shard: my_shard,
            },
        )?;
        Ok(None)
    }
}

/// 尽力向所有同伴广播中止
///
/// 发送失败（对方已退出）被忽略——这只是在进程终止前的一次通知。
pub fn broadcast_abort(transport: &dyn Transport, reason: &str) {
    for peer in 0..transport.size() {
        if peer == transport.rank() {
            continue;
        }
        let _ = transport.send(
            peer,
            Message::Abort {
                rank: transport.rank(),
                reason: reason.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_start_and_end_barrier() {
        let mut group = ChannelTransport::create_group(3);
        let t2 = group.pop().unwrap();
        let t1 = group.pop().unwrap();
        let t0 = group.pop().unwrap();

        let worker = |transport: ChannelTransport| {
            thread::spawn(move || {
                start_barrier(&transport).unwrap();
                let shard = PathBuf::from(format!("shard-{}", transport.rank()));
                let merged = end_barrier(&transport, shard).unwrap();
                assert!(merged.is_none());
            })
        };
        let h1 = worker(t1);
        let h2 = worker(t2);

        start_barrier(&t0).unwrap();
        let shards = end_barrier(&t0, PathBuf::from("shard-0")).unwrap().unwrap();
        assert_eq!(
            shards,
            vec![
                PathBuf::from("shard-0"),
                PathBuf::from("shard-1"),
                PathBuf::from("shard-2"),
            ]
        );

        h1.join().unwrap();
        h2.join().unwrap();
    }

    #[test]
    fn test_unexpected_message_is_protocol_error() {
        let mut group = ChannelTransport::create_group(2);
        let t1 = group.pop().unwrap();
        let t0 = group.pop().unwrap();

        // 工作者在开始屏障发送 Go 而不是 Ready
        t1.send(0, Message::Go).unwrap();
        let err = start_barrier(&t0).unwrap_err();
        assert!(matches!(err, CnError::Protocol { .. }));
    }

    #[test]
    fn test_duplicate_ready_is_protocol_error() {
        let mut group = ChannelTransport::create_group(3);
        let _t2 = group.pop().unwrap();
        let t1 = group.pop().unwrap();
        let t0 = group.pop().unwrap();

        t1.send(0, Message::Ready { rank: 1 }).unwrap();
        t1.send(0, Message::Ready { rank: 1 }).unwrap();
        let err = start_barrier(&t0).unwrap_err();
        assert!(matches!(err, CnError::Protocol { .. }));
    }

    #[test]
    fn test_abort_propagates() {
        let mut group = ChannelTransport::create_group(2);
        let t1 = group.pop().unwrap();
        let t0 = group.pop().unwrap();

        broadcast_abort(&t1, "disk on fire");
        let err = start_barrier(&t0).unwrap_err();
        assert!(matches!(err, CnError::Aborted { .. }));
    }

    #[test]
    fn test_single_worker_barriers_trivial() {
        let mut group = ChannelTransport::create_group(1);
        let t0 = group.pop().unwrap();
        start_barrier(&t0).unwrap();
        let shards = end_barrier(&t0, PathBuf::from("only")).unwrap().unwrap();
        assert_eq!(shards.len(), 1);
    }
}

use std::collections::BTreeMap;

use crate::transport::{PeerId, ReplyHandle};

/// Подписчики одного назначения.
///
/// Ключ — [`PeerId`], поэтому повторная подписка того же отправителя не
/// создаёт второй записи и событие доставляется ему ровно один раз.
#[derive(Debug, Default, Clone)]
pub struct SubscriberSet {
    members: BTreeMap<PeerId, ReplyHandle>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет подписчика. Адрес уже известного отправителя заменяется.
    /// Возвращает `true`, если отправителя раньше в наборе не было.
    pub fn insert(
        &mut self,
        handle: ReplyHandle,
    ) -> bool {
        self.members.insert(handle.peer_id(), handle).is_none()
    }

    /// Удаляет подписчика. Возвращает `true`, если он был в наборе.
    pub fn remove(
        &mut self,
        peer: PeerId,
    ) -> bool {
        self.members.remove(&peer).is_some()
    }

    pub fn contains(
        &self,
        peer: PeerId,
    ) -> bool {
        self.members.contains_key(&peer)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Идентификаторы подписчиков по возрастанию.
    pub fn peers(&self) -> Vec<PeerId> {
        self.members.keys().copied().collect()
    }

    /// Снимок адресов для рассылки.
    pub fn handles(&self) -> Vec<ReplyHandle> {
        self.members.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingSink;

    #[test]
    fn test_insert_is_keyed_by_peer() {
        let mut set = SubscriberSet::new();
        assert!(set.insert(RecordingSink::new(1)));
        assert!(!set.insert(RecordingSink::new(1)));
        assert!(set.insert(RecordingSink::new(2)));
        assert_eq!(set.len(), 2);
        assert_eq!(set.peers(), vec![PeerId::new(1), PeerId::new(2)]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut set = SubscriberSet::new();
        assert!(!set.remove(PeerId::new(7)));
        set.insert(RecordingSink::new(7));
        assert!(set.contains(PeerId::new(7)));
        assert!(set.remove(PeerId::new(7)));
        assert!(set.is_empty());
    }

    /// Тест проверяет, что повторная подписка заменяет адрес, а не
    /// дублирует его.
    #[test]
    fn test_resubscribe_replaces_handle() {
        let mut set = SubscriberSet::new();
        let old = RecordingSink::new(3);
        let new = RecordingSink::new(3);
        set.insert(old.clone());
        set.insert(new.clone());

        let handles = set.handles();
        assert_eq!(handles.len(), 1);
        handles[0]
            .post(crate::protocol::DownstreamMessage::event("e1", "ticks", serde_json::json!(1)))
            .unwrap();
        assert!(old.sent().is_empty());
        assert_eq!(new.sent().len(), 1);
    }
}

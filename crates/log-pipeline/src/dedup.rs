//! 중복 제거 -- 한 번 처리한 식별자를 기억합니다.
//!
//! 로테이션 후 재읽기나 같은 내용의 반복 기록으로 인해 같은 이벤트가
//! 두 번 처리되지 않도록 합니다. 서버 모니터마다 별도 인스턴스를 가집니다.
//!
//! 기본은 무제한 보관(만료 없음)이며, 용량을 지정하면 가장 오래된 식별자부터 잊습니다.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// 중복 제거 가드
#[derive(Debug)]
pub struct DedupGuard<K> {
    /// 본 식별자 집합
    seen: HashSet<K>,
    /// 삽입 순서 (용량 제한이 있을 때만 사용)
    order: VecDeque<K>,
    /// 최대 보관 수 (`None`이면 무제한)
    capacity: Option<usize>,
    /// 억제된 중복 수
    suppressed: u64,
}

impl<K: Hash + Eq + Clone> DedupGuard<K> {
    /// 무제한 가드를 생성합니다.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// 용량을 지정하여 가드를 생성합니다.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
            suppressed: 0,
        }
    }

    /// 이미 본 식별자인지 확인합니다.
    pub fn seen(&self, identity: &K) -> bool {
        self.seen.contains(identity)
    }

    /// 식별자를 기록합니다.
    pub fn mark(&mut self, identity: K) {
        let Some(capacity) = self.capacity else {
            self.seen.insert(identity);
            return;
        };

        if !self.seen.insert(identity.clone()) {
            return;
        }
        self.order.push_back(identity);
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }

    /// 처음 보는 식별자면 기록하고 `true`, 이미 본 식별자면 `false`를 반환합니다.
    pub fn check_and_mark(&mut self, identity: K) -> bool {
        if self.seen(&identity) {
            self.suppressed += 1;
            return false;
        }
        self.mark(identity);
        true
    }

    /// 기억 중인 식별자 수
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// 억제된 중복 수
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sight_passes_repeat_is_suppressed() {
        let mut guard = DedupGuard::unbounded();
        assert!(guard.check_and_mark(("Foo", "1.2.3.4")));
        assert!(!guard.check_and_mark(("Foo", "1.2.3.4")));
        assert!(guard.check_and_mark(("Foo", "5.6.7.8")));
        assert_eq!(guard.len(), 2);
        assert_eq!(guard.suppressed(), 1);
    }

    #[test]
    fn seen_does_not_mark() {
        let mut guard = DedupGuard::unbounded();
        assert!(!guard.seen(&"a"));
        assert!(!guard.seen(&"a"));
        guard.mark("a");
        assert!(guard.seen(&"a"));
    }

    #[test]
    fn unbounded_guard_never_forgets() {
        let mut guard = DedupGuard::unbounded();
        for i in 0..10_000 {
            guard.mark(i);
        }
        assert!(guard.seen(&0));
        assert_eq!(guard.len(), 10_000);
    }

    #[test]
    fn capped_guard_evicts_oldest_first() {
        let mut guard = DedupGuard::with_capacity(Some(2));
        guard.mark("a");
        guard.mark("b");
        guard.mark("c");
        assert!(!guard.seen(&"a"));
        assert!(guard.seen(&"b"));
        assert!(guard.seen(&"c"));
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn capped_guard_ignores_repeated_marks() {
        let mut guard = DedupGuard::with_capacity(Some(2));
        guard.mark("a");
        guard.mark("a");
        guard.mark("b");
        assert!(guard.seen(&"a"));
        assert!(guard.seen(&"b"));
    }
}

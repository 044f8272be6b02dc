//! 对局会话
//!
//! `GameSession` 是单局的回合状态机，本身不做任何 IO：每次状态变化产出一个
//! [`Outbox`]，由 [`SessionHandle`] 在同一把锁内解析成具体参与者并投递。
//! 参与者的投递不会等待，投递失败的参与者按断开处理。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use protocol::{
    Action, Board, Color, GameRecord, GameResult, GoError, KoRule, Notice, Point, Prisoners,
    RuleEngine, Seat, ServerMessage, Snapshot,
};

use crate::participant::Participant;

/// 消息接收范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// 所有在座的玩家和观战者
    All,
    /// 某一方玩家
    Player(Color),
    /// 所有观战者
    Observers,
    /// 某个具体参与者
    Member(u64),
}

/// 待发送的消息，按产生顺序投递
#[derive(Debug, Default, PartialEq)]
pub struct Outbox {
    messages: Vec<(Audience, ServerMessage)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, audience: Audience, msg: impl Into<ServerMessage>) {
        self.messages.push((audience, msg.into()));
    }

    pub fn all(&mut self, msg: impl Into<ServerMessage>) {
        self.push(Audience::All, msg);
    }

    pub fn player(&mut self, color: Color, msg: impl Into<ServerMessage>) {
        self.push(Audience::Player(color), msg);
    }

    pub fn observers(&mut self, msg: impl Into<ServerMessage>) {
        self.push(Audience::Observers, msg);
    }

    pub fn member(&mut self, id: u64, msg: impl Into<ServerMessage>) {
        self.push(Audience::Member(id), msg);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Audience, ServerMessage)> {
        self.messages.iter()
    }
}

impl IntoIterator for Outbox {
    type Item = (Audience, ServerMessage);
    type IntoIter = std::vec::IntoIter<(Audience, ServerMessage)>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

/// 入座凭证
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub seat: Seat,
    pub id: u64,
}

struct Member {
    id: u64,
    participant: Arc<dyn Participant>,
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member").field("id", &self.id).finish_non_exhaustive()
    }
}

/// 执棋席位
#[derive(Debug)]
enum SeatSlot {
    /// 尚未有人入座
    Open,
    Occupied(Member),
    /// 入座者已离开，不会再绑定其他人
    Vacated,
}

impl SeatSlot {
    fn member(&self) -> Option<&Member> {
        match self {
            SeatSlot::Occupied(member) => Some(member),
            _ => None,
        }
    }
}

/// 席位表
///
/// 先到先得：第一个是黑方，第二个是白方，之后都是观战者。
#[derive(Debug)]
pub struct Seats {
    black: SeatSlot,
    white: SeatSlot,
    observers: Vec<Member>,
    next_id: u64,
}

impl Seats {
    pub fn new() -> Self {
        Self {
            black: SeatSlot::Open,
            white: SeatSlot::Open,
            observers: Vec::new(),
            next_id: 1,
        }
    }

    fn slot(&self, color: Color) -> &SeatSlot {
        match color {
            Color::Black => &self.black,
            Color::White => &self.white,
        }
    }

    fn slot_mut(&mut self, color: Color) -> &mut SeatSlot {
        match color {
            Color::Black => &mut self.black,
            Color::White => &mut self.white,
        }
    }

    fn generate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// 按先到先得分配席位
    pub fn bind(&mut self, participant: Arc<dyn Participant>) -> Ticket {
        let id = self.generate_id();
        let member = Member { id, participant };

        for color in [Color::Black, Color::White] {
            let slot = self.slot_mut(color);
            if matches!(slot, SeatSlot::Open) {
                *slot = SeatSlot::Occupied(member);
                return Ticket {
                    seat: Seat::Player(color),
                    id,
                };
            }
        }

        self.observers.push(member);
        Ticket {
            seat: Seat::Observer,
            id,
        }
    }

    /// 只作为观战者入座
    pub fn bind_observer(&mut self, participant: Arc<dyn Participant>) -> Ticket {
        let id = self.generate_id();
        self.observers.push(Member { id, participant });
        Ticket {
            seat: Seat::Observer,
            id,
        }
    }

    /// 离座；执棋席位变为 Vacated
    pub fn vacate(&mut self, ticket: &Ticket) -> bool {
        match ticket.seat {
            Seat::Player(color) => {
                let slot = self.slot_mut(color);
                if slot.member().is_some_and(|m| m.id == ticket.id) {
                    *slot = SeatSlot::Vacated;
                    true
                } else {
                    false
                }
            }
            Seat::Observer => {
                let before = self.observers.len();
                self.observers.retain(|m| m.id != ticket.id);
                self.observers.len() != before
            }
        }
    }

    fn seat_of(&self, id: u64) -> Option<Seat> {
        for color in [Color::Black, Color::White] {
            if self.slot(color).member().is_some_and(|m| m.id == id) {
                return Some(Seat::Player(color));
            }
        }
        self.observers
            .iter()
            .any(|m| m.id == id)
            .then_some(Seat::Observer)
    }

    /// 黑白双方都曾入座
    pub fn both_bound(&self) -> bool {
        !matches!(self.black, SeatSlot::Open) && !matches!(self.white, SeatSlot::Open)
    }

    /// 是否有执棋方离开
    pub fn any_vacated(&self) -> bool {
        matches!(self.black, SeatSlot::Vacated) || matches!(self.white, SeatSlot::Vacated)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// 解析接收范围，附带参与者 ID
    pub fn audience(&self, audience: Audience) -> Vec<(u64, Arc<dyn Participant>)> {
        let players = [Color::Black, Color::White]
            .into_iter()
            .filter_map(|c| self.slot(c).member());
        let everyone = players.chain(self.observers.iter());

        let selected: Vec<&Member> = match audience {
            Audience::All => everyone.collect(),
            Audience::Player(color) => self.slot(color).member().into_iter().collect(),
            Audience::Observers => self.observers.iter().collect(),
            Audience::Member(id) => everyone.filter(|m| m.id == id).collect(),
        };
        selected
            .into_iter()
            .map(|m| (m.id, m.participant.clone()))
            .collect()
    }
}

impl Default for Seats {
    fn default() -> Self {
        Self::new()
    }
}

/// 对局阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingMove(Color),
    Finished(GameResult),
}

/// 单局对局
#[derive(Debug)]
pub struct GameSession {
    board: Board,
    rules: RuleEngine,
    phase: Phase,
    /// 上一个动作是停一手
    pass_pending: bool,
    prisoners: Prisoners,
    seats: Seats,
    record: GameRecord,
}

impl GameSession {
    /// 创建新对局，黑方先行
    pub fn new(board_size: usize, ko_rule: KoRule) -> Self {
        Self {
            board: Board::new(board_size),
            rules: RuleEngine::new(ko_rule),
            phase: Phase::AwaitingMove(Color::Black),
            pass_pending: false,
            prisoners: Prisoners::default(),
            seats: Seats::new(),
            record: GameRecord::new(board_size, ko_rule),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_size(&self) -> usize {
        self.board.size()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.board.snapshot()
    }

    /// 当前行棋方，终局后为 None
    pub fn current_player(&self) -> Option<Color> {
        match self.phase {
            Phase::AwaitingMove(color) => Some(color),
            Phase::Finished(_) => None,
        }
    }

    pub fn prisoners(&self) -> Prisoners {
        self.prisoners
    }

    pub fn result(&self) -> Option<GameResult> {
        match self.phase {
            Phase::Finished(result) => Some(result),
            Phase::AwaitingMove(_) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished(_))
    }

    pub fn pass_pending(&self) -> bool {
        self.pass_pending
    }

    pub fn record(&self) -> &GameRecord {
        &self.record
    }

    pub fn seats(&self) -> &Seats {
        &self.seats
    }

    /// 参与者入座
    ///
    /// 白方入座时开局：向所有人广播棋盘和回合状态。
    pub fn join(&mut self, participant: Arc<dyn Participant>) -> (Ticket, Outbox) {
        let ticket = self.seats.bind(participant);
        let mut outbox = Outbox::new();
        outbox.member(ticket.id, ServerMessage::Assignment(ticket.seat));

        match ticket.seat {
            Seat::Player(Color::Black) => {
                outbox.member(
                    ticket.id,
                    Notice::Info("Waiting for an opponent to join".to_string()),
                );
            }
            Seat::Player(Color::White) => {
                outbox.all(ServerMessage::Board(self.snapshot()));
                self.push_status(&mut outbox);
            }
            Seat::Observer => self.push_catch_up(ticket.id, &mut outbox),
        }

        (ticket, outbox)
    }

    /// 以观战者身份入座（不占执棋席位）
    pub fn observe(&mut self, participant: Arc<dyn Participant>) -> (Ticket, Outbox) {
        let ticket = self.seats.bind_observer(participant);
        let mut outbox = Outbox::new();
        outbox.member(ticket.id, ServerMessage::Assignment(ticket.seat));
        self.push_catch_up(ticket.id, &mut outbox);
        (ticket, outbox)
    }

    /// 参与者离开；执棋方离开时通知其余所有人
    pub fn leave(&mut self, ticket: &Ticket) -> Outbox {
        let mut outbox = Outbox::new();
        if self.seats.vacate(ticket) {
            if let Seat::Player(color) = ticket.seat {
                outbox.all(Notice::OpponentDisconnected(color));
            }
        }
        outbox
    }

    /// 执行一个动作
    ///
    /// 返回 Err 时状态不变，由调用方只通知行动方。
    pub fn apply(&mut self, color: Color, action: Action) -> Result<Outbox, GoError> {
        let outbox = match action {
            Action::Move { x, y } => self.process_move(Point::new(x, y), color)?,
            Action::Pass => self.process_pass(color)?,
            Action::Surrender => self.process_surrender(color)?,
            Action::Resume => self.process_resume(color)?,
        };
        self.record.push(color, action);
        Ok(outbox)
    }

    fn expect_turn(&self, color: Color) -> Result<(), GoError> {
        match self.phase {
            Phase::Finished(_) => Err(GoError::GameOver),
            Phase::AwaitingMove(mover) if mover != color => Err(GoError::NotYourTurn),
            Phase::AwaitingMove(_) => Ok(()),
        }
    }

    fn process_move(&mut self, point: Point, color: Color) -> Result<Outbox, GoError> {
        self.expect_turn(color)?;
        self.rules.check_move(&self.board, point, color)?;

        let captured = self.rules.play_move(&mut self.board, point, color);
        self.prisoners.add(color, captured);
        self.pass_pending = false;
        self.phase = Phase::AwaitingMove(color.opponent());
        debug!("{} 落子 {}，提 {} 子", color, point, captured);

        let mut outbox = Outbox::new();
        outbox.all(ServerMessage::Board(self.snapshot()));
        self.push_status(&mut outbox);
        Ok(outbox)
    }

    fn process_pass(&mut self, color: Color) -> Result<Outbox, GoError> {
        self.expect_turn(color)?;

        let mut outbox = Outbox::new();
        outbox.all(Notice::Passed { by: color });

        if self.pass_pending {
            let score = self.rules.calculate_score(&self.board, self.prisoners);
            self.finish(GameResult::Scored(score), &mut outbox);
        } else {
            self.pass_pending = true;
            self.phase = Phase::AwaitingMove(color.opponent());
            debug!("{} 停一手", color);
            self.push_status(&mut outbox);
        }
        Ok(outbox)
    }

    fn process_surrender(&mut self, color: Color) -> Result<Outbox, GoError> {
        if self.is_finished() {
            return Err(GoError::GameOver);
        }

        let mut outbox = Outbox::new();
        self.finish(
            GameResult::Resignation {
                winner: color.opponent(),
            },
            &mut outbox,
        );
        Ok(outbox)
    }

    fn process_resume(&mut self, color: Color) -> Result<Outbox, GoError> {
        if !self.is_finished() {
            return Err(GoError::GameInProgress);
        }

        self.phase = Phase::AwaitingMove(color.opponent());
        self.pass_pending = false;
        info!("{} 恢复对局", color);

        let mut outbox = Outbox::new();
        outbox.all(Notice::Resumed { by: color });
        outbox.all(ServerMessage::Board(self.snapshot()));
        self.push_status(&mut outbox);
        Ok(outbox)
    }

    fn finish(&mut self, result: GameResult, outbox: &mut Outbox) {
        self.phase = Phase::Finished(result);
        self.pass_pending = false;
        self.record.set_result(result);
        info!("对局结束: {}", result);
        outbox.all(Notice::GameOver(result));
    }

    /// 回合状态：行棋方、对手、观战者各一条
    fn push_status(&self, outbox: &mut Outbox) {
        let Phase::AwaitingMove(mover) = self.phase else {
            return;
        };
        let prisoners = self.prisoners;
        outbox.player(mover, Notice::YourTurn { prisoners });
        outbox.player(mover.opponent(), Notice::OpponentTurn { prisoners });
        outbox.observers(Notice::ToMove {
            color: mover,
            prisoners,
        });
    }

    /// 中途加入的观战者补发当前局面
    fn push_catch_up(&self, id: u64, outbox: &mut Outbox) {
        outbox.member(id, ServerMessage::Board(self.snapshot()));
        match self.phase {
            Phase::AwaitingMove(color) => outbox.member(
                id,
                Notice::ToMove {
                    color,
                    prisoners: self.prisoners,
                },
            ),
            Phase::Finished(result) => outbox.member(id, Notice::GameOver(result)),
        }
    }

    /// 投递失败的参与者按断开处理
    pub fn evict(&mut self, id: u64) -> Outbox {
        match self.seats.seat_of(id) {
            Some(seat) => self.leave(&Ticket { seat, id }),
            None => Outbox::new(),
        }
    }

    /// 把待发送消息解析到具体参与者
    pub fn resolve(&self, outbox: Outbox) -> Vec<(Arc<dyn Participant>, ServerMessage)> {
        self.address(outbox)
            .into_iter()
            .map(|(_, participant, msg)| (participant, msg))
            .collect()
    }

    fn address(&self, outbox: Outbox) -> Vec<(u64, Arc<dyn Participant>, ServerMessage)> {
        let mut deliveries = Vec::new();
        for (audience, msg) in outbox {
            for (id, participant) in self.seats.audience(audience) {
                deliveries.push((id, participant, msg.clone()));
            }
        }
        deliveries
    }

    /// 逐条投递，失败的参与者离座，离座产生的通知继续投递
    pub async fn dispatch(&mut self, outbox: Outbox) {
        let mut pending = outbox;
        while !pending.is_empty() {
            let mut failed: Vec<u64> = Vec::new();
            for (id, participant, msg) in self.address(pending) {
                if failed.contains(&id) {
                    continue;
                }
                if let Err(e) = participant.notify(msg).await {
                    warn!("通知 {} 失败，按断开处理: {}", participant.describe(), e);
                    failed.push(id);
                }
            }

            pending = Outbox::new();
            for id in failed {
                let notices = self.evict(id);
                pending.messages.extend(notices);
            }
        }
    }
}

/// 对局状态摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub id: u64,
    pub snapshot: Snapshot,
    pub current_player: Option<Color>,
    pub prisoners: Prisoners,
    pub result: Option<GameResult>,
    pub actions: usize,
    pub observers: usize,
}

struct Shared {
    id: u64,
    session: Mutex<GameSession>,
}

/// 会话句柄
///
/// 所有修改和投递都在同一把锁内串行执行，消息顺序与状态变化顺序一致。
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

/// 不延长会话生命周期的句柄
#[derive(Clone)]
pub struct WeakSessionHandle {
    shared: Weak<Shared>,
}

impl WeakSessionHandle {
    pub fn upgrade(&self) -> Option<SessionHandle> {
        self.shared.upgrade().map(|shared| SessionHandle { shared })
    }
}

impl SessionHandle {
    pub fn new(id: u64, session: GameSession) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                session: Mutex::new(session),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn downgrade(&self) -> WeakSessionHandle {
        WeakSessionHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// 在锁内修改状态并投递产生的消息
    ///
    /// 参与者的 `notify` 不会等待对端，持锁投递不会拖住会话。
    async fn with_session<T>(&self, f: impl FnOnce(&mut GameSession) -> (T, Outbox)) -> T {
        let mut session = self.shared.session.lock().await;
        let (value, outbox) = f(&mut *session);
        session.dispatch(outbox).await;
        value
    }

    /// 入座
    pub async fn join(&self, participant: Arc<dyn Participant>) -> Ticket {
        let ticket = self.with_session(|s| s.join(participant)).await;
        info!("会话 #{} 入座: {}", self.id(), ticket.seat);
        ticket
    }

    /// 提交动作
    ///
    /// 被拒绝时只通知提交者，并把原因返回给调用方。对手未入座或已离开时一律等待。
    pub async fn submit(&self, ticket: &Ticket, action: Action) -> Result<(), GoError> {
        self.with_session(|s| {
            let outcome = match ticket.seat.color() {
                None => Err(GoError::Spectator),
                Some(_) if !s.seats().both_bound() || s.seats().any_vacated() => {
                    Err(GoError::WaitingForOpponent)
                }
                Some(color) => s.apply(color, action),
            };

            match outcome {
                Ok(outbox) => (Ok(()), outbox),
                Err(err) => {
                    let mut outbox = Outbox::new();
                    outbox.member(ticket.id, Notice::Rejected(err.clone()));
                    (Err(err), outbox)
                }
            }
        })
        .await
    }

    /// 只发给某个参与者的通知
    pub async fn notify(&self, ticket: &Ticket, notice: Notice) {
        self.with_session(|_| {
            let mut outbox = Outbox::new();
            outbox.member(ticket.id, notice);
            ((), outbox)
        })
        .await
    }

    /// 参与者断开
    pub async fn disconnect(&self, ticket: &Ticket) {
        self.with_session(|s| ((), s.leave(ticket))).await;
        info!("会话 #{} 离座: {}", self.id(), ticket.seat);
    }

    pub async fn status(&self) -> SessionStatus {
        let session = self.shared.session.lock().await;
        SessionStatus {
            id: self.id(),
            snapshot: session.snapshot(),
            current_player: session.current_player(),
            prisoners: session.prisoners(),
            result: session.result(),
            actions: session.record().len(),
            observers: session.seats().observer_count(),
        }
    }

    pub async fn record(&self) -> GameRecord {
        self.shared.session.lock().await.record().clone()
    }

    /// 新连接能否加入：执棋双方都没有离开
    pub async fn is_joinable(&self) -> bool {
        !self.shared.session.lock().await.seats().any_vacated()
    }
}

/// 会话注册表
///
/// 由服务器持有。新连接加入当前会话；当前会话有执棋方离开后，下一个连接开新局。
pub struct SessionRegistry {
    board_size: usize,
    ko_rule: KoRule,
    next_id: AtomicU64,
    current: Option<SessionHandle>,
}

impl SessionRegistry {
    pub fn new(board_size: usize, ko_rule: KoRule) -> Self {
        Self {
            board_size,
            ko_rule,
            next_id: AtomicU64::new(1),
            current: None,
        }
    }

    /// 生成新的会话 ID
    fn generate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 获取可加入的会话，没有则新建
    pub async fn open_session(&mut self) -> SessionHandle {
        if let Some(handle) = &self.current {
            if handle.is_joinable().await {
                return handle.clone();
            }
        }

        let id = self.generate_id();
        let handle = SessionHandle::new(id, GameSession::new(self.board_size, self.ko_rule));
        info!("创建会话 #{} ({}x{})", id, self.board_size, self.board_size);
        self.current = Some(handle.clone());
        handle
    }

    /// 已创建的会话数
    pub fn count(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use protocol::{GameOutcome, ServerLine, StoneColor};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::participant::RemotePlayer;

    /// 记录收到的每一行
    #[derive(Default)]
    struct Recorder {
        lines: std::sync::Mutex<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.lines.lock().unwrap())
        }
    }

    #[async_trait]
    impl Participant for Recorder {
        async fn notify(&self, msg: ServerMessage) -> protocol::Result<()> {
            self.lines.lock().unwrap().push(msg.to_string());
            Ok(())
        }

        fn describe(&self) -> String {
            "recorder".to_string()
        }
    }

    type Deliveries = Vec<(Arc<dyn Participant>, ServerMessage)>;

    /// 某个参与者收到的行
    fn to(deliveries: &Deliveries, who: &Arc<Recorder>) -> Vec<String> {
        let who: Arc<dyn Participant> = who.clone();
        deliveries
            .iter()
            .filter(|(p, _)| Arc::ptr_eq(p, &who))
            .map(|(_, msg)| msg.to_string())
            .collect()
    }

    fn lines(session: &GameSession, outbox: Outbox, who: &Arc<Recorder>) -> Vec<String> {
        to(&session.resolve(outbox), who)
    }

    fn seated() -> (GameSession, Arc<Recorder>, Arc<Recorder>) {
        let mut session = GameSession::new(9, KoRule::Simple);
        let black = Arc::new(Recorder::default());
        let white = Arc::new(Recorder::default());
        session.join(black.clone());
        session.join(white.clone());
        (session, black, white)
    }

    fn mv(x: i32, y: i32) -> Action {
        Action::Move { x, y }
    }

    #[test]
    fn test_first_come_seating() {
        let mut session = GameSession::new(9, KoRule::Simple);
        let (first, _) = session.join(Arc::new(Recorder::default()));
        let (second, _) = session.join(Arc::new(Recorder::default()));
        let (third, _) = session.join(Arc::new(Recorder::default()));

        assert_eq!(first.seat, Seat::Player(Color::Black));
        assert_eq!(second.seat, Seat::Player(Color::White));
        assert_eq!(third.seat, Seat::Observer);
        assert_eq!(session.seats().observer_count(), 1);
    }

    #[test]
    fn test_game_starts_when_white_joins() {
        let mut session = GameSession::new(5, KoRule::Simple);
        let black = Arc::new(Recorder::default());
        let white = Arc::new(Recorder::default());

        let (_, outbox) = session.join(black.clone());
        assert_eq!(
            lines(&session, outbox, &black),
            vec!["COLOR BLACK", "MESSAGE Waiting for an opponent to join"]
        );

        let (_, outbox) = session.join(white.clone());
        let empty = session.snapshot().to_string();
        let deliveries = session.resolve(outbox);

        assert_eq!(
            to(&deliveries, &black),
            vec![
                format!("BOARD {empty}"),
                "MESSAGE Your move (prisoners: B=0, W=0)".to_string(),
            ]
        );
        assert_eq!(
            to(&deliveries, &white),
            vec![
                "COLOR WHITE".to_string(),
                format!("BOARD {empty}"),
                "MESSAGE Opponent's move (prisoners: B=0, W=0)".to_string(),
            ]
        );
    }

    #[test]
    fn test_move_flips_turn_and_broadcasts() {
        let (mut session, black, white) = seated();

        let outbox = session.apply(Color::Black, mv(4, 4)).unwrap();
        assert_eq!(session.current_player(), Some(Color::White));
        assert_eq!(
            session.board().get(Point::new(4, 4)),
            Some(StoneColor::Black)
        );

        let board_line = format!("BOARD {}", session.snapshot());
        let deliveries = session.resolve(outbox);
        assert_eq!(deliveries.len(), 4);
        assert_eq!(
            to(&deliveries, &black),
            vec![
                board_line.clone(),
                "MESSAGE Opponent's move (prisoners: B=0, W=0)".to_string(),
            ]
        );
        assert_eq!(
            to(&deliveries, &white),
            vec![
                board_line,
                "MESSAGE Your move (prisoners: B=0, W=0)".to_string(),
            ]
        );
    }

    #[test]
    fn test_move_out_of_turn_is_rejected() {
        let (mut session, _black, _white) = seated();
        let before = session.snapshot();

        assert_eq!(
            session.apply(Color::White, mv(0, 0)),
            Err(GoError::NotYourTurn)
        );
        assert_eq!(session.snapshot(), before);
        assert_eq!(session.current_player(), Some(Color::Black));
        assert!(session.record().is_empty());
    }

    #[test]
    fn test_illegal_move_leaves_state_unchanged() {
        let (mut session, _black, _white) = seated();
        session.apply(Color::Black, mv(2, 2)).unwrap();

        assert_eq!(
            session.apply(Color::White, mv(2, 2)),
            Err(GoError::Occupied { x: 2, y: 2 })
        );
        assert_eq!(
            session.apply(Color::White, mv(9, 0)),
            Err(GoError::OutOfBounds { x: 9, y: 0 })
        );
        assert_eq!(session.current_player(), Some(Color::White));
        assert_eq!(session.record().len(), 1);
    }

    #[test]
    fn test_captures_accrue_prisoners() {
        let (mut session, _black, _white) = seated();
        // 黑 (1,0) (0,1) (1,2) 包围白 (1,1)，黑 (2,1) 提子
        let moves = [
            (Color::Black, mv(1, 0)),
            (Color::White, mv(1, 1)),
            (Color::Black, mv(0, 1)),
            (Color::White, mv(8, 8)),
            (Color::Black, mv(1, 2)),
            (Color::White, mv(8, 7)),
            (Color::Black, mv(2, 1)),
        ];
        for (color, action) in moves {
            session.apply(color, action).unwrap();
        }

        assert_eq!(session.prisoners(), Prisoners { black: 1, white: 0 });
        assert_eq!(
            session.board().get(Point::new(1, 1)),
            Some(StoneColor::Empty)
        );
    }

    #[test]
    fn test_single_pass_keeps_board_and_flips_turn() {
        let (mut session, black, _white) = seated();

        let outbox = session.apply(Color::Black, Action::Pass).unwrap();
        assert!(session.pass_pending());
        assert_eq!(session.current_player(), Some(Color::White));

        let received = lines(&session, outbox, &black);
        assert_eq!(
            received,
            vec![
                "MESSAGE BLACK passed",
                "MESSAGE Opponent's move (prisoners: B=0, W=0)"
            ]
        );
    }

    #[test]
    fn test_two_passes_finish_with_score() {
        let (mut session, _black, white) = seated();
        session.apply(Color::Black, mv(4, 4)).unwrap();
        session.apply(Color::White, Action::Pass).unwrap();
        let outbox = session.apply(Color::Black, Action::Pass).unwrap();

        assert!(session.is_finished());
        assert_eq!(session.current_player(), None);
        let Some(GameResult::Scored(score)) = session.result() else {
            panic!("expected a scored result");
        };
        assert_eq!(score.black.territory, 80);
        assert_eq!(score.outcome(), GameOutcome::Winner(Color::Black));

        let received = lines(&session, outbox, &white);
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], "MESSAGE BLACK passed");
        assert!(received[1].starts_with("MESSAGE Game over. BLACK 80"));
        assert_eq!(session.record().result, session.result());
    }

    #[test]
    fn test_move_clears_pending_pass() {
        let (mut session, _black, _white) = seated();
        session.apply(Color::Black, Action::Pass).unwrap();
        session.apply(Color::White, mv(3, 3)).unwrap();
        assert!(!session.pass_pending());

        session.apply(Color::Black, Action::Pass).unwrap();
        assert!(!session.is_finished());
    }

    #[test]
    fn test_surrender_out_of_turn() {
        let (mut session, black, _white) = seated();

        let outbox = session.apply(Color::White, Action::Surrender).unwrap();
        assert_eq!(
            session.result(),
            Some(GameResult::Resignation {
                winner: Color::Black
            })
        );
        assert_eq!(
            lines(&session, outbox, &black),
            vec!["MESSAGE WHITE surrendered. BLACK wins!"]
        );

        assert_eq!(
            session.apply(Color::Black, Action::Surrender),
            Err(GoError::GameOver)
        );
        assert_eq!(session.apply(Color::Black, mv(0, 0)), Err(GoError::GameOver));
        assert_eq!(session.apply(Color::Black, Action::Pass), Err(GoError::GameOver));
    }

    #[test]
    fn test_resume_after_finish() {
        let (mut session, _black, white) = seated();
        session.apply(Color::Black, mv(4, 4)).unwrap();
        session.apply(Color::White, Action::Pass).unwrap();
        session.apply(Color::Black, Action::Pass).unwrap();
        assert!(session.is_finished());

        let outbox = session.apply(Color::Black, Action::Resume).unwrap();
        assert_eq!(session.current_player(), Some(Color::White));
        assert!(!session.pass_pending());

        let received = lines(&session, outbox, &white);
        assert_eq!(received[0], "MESSAGE BLACK resumed the game");
        assert!(received[1].starts_with("BOARD "));
        assert_eq!(received[2], "MESSAGE Your move (prisoners: B=0, W=0)");

        // 恢复后单次停一手不会立即终局
        session.apply(Color::White, Action::Pass).unwrap();
        assert!(!session.is_finished());
    }

    #[test]
    fn test_resume_during_game_is_rejected() {
        let (mut session, _black, _white) = seated();
        assert_eq!(
            session.apply(Color::Black, Action::Resume),
            Err(GoError::GameInProgress)
        );
    }

    #[test]
    fn test_ko_through_session() {
        let (mut session, _black, _white) = seated();
        let moves = [
            (Color::Black, mv(1, 0)),
            (Color::White, mv(2, 0)),
            (Color::Black, mv(0, 1)),
            (Color::White, mv(3, 1)),
            (Color::Black, mv(1, 2)),
            (Color::White, mv(2, 2)),
            (Color::Black, mv(2, 1)),
            (Color::White, mv(1, 1)),
        ];
        for (color, action) in moves {
            session.apply(color, action).unwrap();
        }
        assert_eq!(session.prisoners().white, 1);

        assert_eq!(session.apply(Color::Black, mv(2, 1)), Err(GoError::Ko));
        assert_eq!(session.current_player(), Some(Color::Black));
    }

    #[test]
    fn test_leave_vacates_and_notifies() {
        let mut session = GameSession::new(9, KoRule::Simple);
        let black = Arc::new(Recorder::default());
        let white = Arc::new(Recorder::default());
        let (black_ticket, _) = session.join(black.clone());
        session.join(white.clone());

        let outbox = session.leave(&black_ticket);
        assert_eq!(
            lines(&session, outbox, &white),
            vec!["MESSAGE BLACK disconnected"]
        );
        assert!(session.seats().any_vacated());

        // 空出的执棋席位不会再分配
        let (late, _) = session.join(Arc::new(Recorder::default()));
        assert_eq!(late.seat, Seat::Observer);

        // 重复离开没有效果
        assert!(session.leave(&black_ticket).is_empty());
    }

    #[test]
    fn test_observer_catches_up() {
        let (mut session, _black, _white) = seated();
        session.apply(Color::Black, mv(4, 4)).unwrap();

        let watcher = Arc::new(Recorder::default());
        let (ticket, outbox) = session.join(watcher.clone());
        assert_eq!(ticket.seat, Seat::Observer);

        let received = lines(&session, outbox, &watcher);
        assert_eq!(received[0], "COLOR OBSERVER");
        assert!(received[1].starts_with("BOARD "));
        assert_eq!(received[2], "MESSAGE WHITE to move (prisoners: B=0, W=0)");
    }

    #[tokio::test]
    async fn test_handle_waits_for_opponent() {
        let handle = SessionHandle::new(1, GameSession::new(9, KoRule::Simple));
        let black = Arc::new(Recorder::default());
        let ticket = handle.join(black.clone()).await;

        assert_eq!(
            handle.submit(&ticket, mv(4, 4)).await,
            Err(GoError::WaitingForOpponent)
        );
        let received = black.take();
        assert_eq!(
            received.last().map(String::as_str),
            Some("MESSAGE Rejected: waiting for an opponent to join")
        );
    }

    #[tokio::test]
    async fn test_game_stalls_after_disconnect() {
        let handle = SessionHandle::new(1, GameSession::new(9, KoRule::Simple));
        let black_ticket = handle.join(Arc::new(Recorder::default())).await;
        let white = Arc::new(Recorder::default());
        let white_ticket = handle.join(white.clone()).await;
        white.take();

        handle.disconnect(&black_ticket).await;
        assert_eq!(white.take(), vec!["MESSAGE BLACK disconnected"]);

        assert_eq!(
            handle.submit(&white_ticket, Action::Surrender).await,
            Err(GoError::WaitingForOpponent)
        );
        assert!(!handle.is_joinable().await);
        assert_eq!(handle.status().await.current_player, Some(Color::Black));
    }

    #[tokio::test]
    async fn test_handle_rejects_observer_actions() {
        let handle = SessionHandle::new(1, GameSession::new(9, KoRule::Simple));
        handle.join(Arc::new(Recorder::default())).await;
        handle.join(Arc::new(Recorder::default())).await;
        let watcher = Arc::new(Recorder::default());
        let ticket = handle.join(watcher.clone()).await;
        watcher.take();

        assert_eq!(
            handle.submit(&ticket, Action::Pass).await,
            Err(GoError::Spectator)
        );
        assert_eq!(watcher.take(), vec!["MESSAGE Rejected: observers cannot act"]);
    }

    #[tokio::test]
    async fn test_handle_status_and_record() {
        let handle = SessionHandle::new(7, GameSession::new(9, KoRule::Simple));
        let black = Arc::new(Recorder::default());
        let white = Arc::new(Recorder::default());
        let black_ticket = handle.join(black.clone()).await;
        let white_ticket = handle.join(white.clone()).await;

        handle.submit(&black_ticket, mv(3, 3)).await.unwrap();
        assert!(handle.submit(&black_ticket, mv(4, 4)).await.is_err());
        handle.submit(&white_ticket, Action::Surrender).await.unwrap();

        let status = handle.status().await;
        assert_eq!(status.id, 7);
        assert_eq!(status.current_player, None);
        assert_eq!(
            status.result,
            Some(GameResult::Resignation {
                winner: Color::Black
            })
        );
        assert_eq!(status.actions, 2);
        assert_eq!(handle.record().await.actions.len(), 2);
    }

    /// BOARD 行里的棋子数
    fn stones_on(line: &str) -> Option<usize> {
        match line.parse::<ServerLine>().ok()? {
            ServerLine::Board(snapshot) => {
                Some(snapshot.cells().iter().filter(|c| !c.is_empty()).count())
            }
            _ => None,
        }
    }

    /// 依次下完给定的点，不是自己的回合就让出再试
    async fn play_all(handle: SessionHandle, ticket: Ticket, points: Vec<(i32, i32)>) {
        for (x, y) in points {
            loop {
                match handle.submit(&ticket, mv(x, y)).await {
                    Ok(()) => break,
                    Err(GoError::NotYourTurn) => tokio::task::yield_now().await,
                    Err(e) => panic!("unexpected rejection at ({x}, {y}): {e}"),
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submits_land_once_per_turn() {
        let handle = SessionHandle::new(1, GameSession::new(9, KoRule::Simple));
        let black_ticket = handle.join(Arc::new(Recorder::default())).await;
        handle.join(Arc::new(Recorder::default())).await;

        let tasks: Vec<_> = (0..8)
            .map(|x| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.submit(&black_ticket, mv(x, 4)).await })
            })
            .collect();

        let mut accepted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(e) => assert_eq!(e, GoError::NotYourTurn),
            }
        }
        assert_eq!(accepted, 1);

        let status = handle.status().await;
        assert_eq!(status.actions, 1);
        assert_eq!(status.current_player, Some(Color::White));
        let record = handle.record().await;
        assert_eq!(record.actions[0].color, Color::Black);
        assert_eq!(
            status.snapshot.cells().iter().filter(|c| !c.is_empty()).count(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_games_deliver_in_state_order() {
        let handle = SessionHandle::new(1, GameSession::new(9, KoRule::Simple));
        let black = Arc::new(Recorder::default());
        let white = Arc::new(Recorder::default());
        let watcher = Arc::new(Recorder::default());
        let black_ticket = handle.join(black.clone()).await;
        let white_ticket = handle.join(white.clone()).await;
        handle.join(watcher.clone()).await;

        let black_moves = (0..6).map(|x| (x, 0)).collect();
        let white_moves = (0..6).map(|x| (x, 8)).collect();
        let (b, w) = tokio::join!(
            tokio::spawn(play_all(handle.clone(), black_ticket, black_moves)),
            tokio::spawn(play_all(handle.clone(), white_ticket, white_moves)),
        );
        b.unwrap();
        w.unwrap();

        assert_eq!(handle.status().await.actions, 12);
        for who in [&black, &white, &watcher] {
            let counts: Vec<usize> = who.take().iter().filter_map(|l| stones_on(l)).collect();
            assert_eq!(counts, (0..=12).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_stalled_observer_does_not_block_session() {
        let handle = SessionHandle::new(1, GameSession::new(9, KoRule::Simple));
        let black = Arc::new(Recorder::default());
        let white = Arc::new(Recorder::default());
        let black_ticket = handle.join(black.clone()).await;
        let white_ticket = handle.join(white.clone()).await;

        // 入座的三条消息正好填满队列，之后从不读取
        let (tx, _rx) = mpsc::channel(3);
        handle
            .join(Arc::new(RemotePlayer::new("stalled", tx)))
            .await;
        assert_eq!(handle.status().await.observers, 1);

        let limit = Duration::from_secs(1);
        timeout(limit, handle.submit(&black_ticket, mv(0, 0)))
            .await
            .expect("black submit stalled")
            .unwrap();
        timeout(limit, handle.submit(&white_ticket, mv(1, 1)))
            .await
            .expect("white submit stalled")
            .unwrap();

        let status = timeout(limit, handle.status()).await.expect("status stalled");
        assert_eq!(status.actions, 2);
        assert_eq!(status.observers, 0);
        assert!(timeout(limit, handle.is_joinable()).await.unwrap());
        assert!(!black.take().iter().any(|l| l.contains("disconnected")));
    }

    #[tokio::test]
    async fn test_stalled_player_counts_as_disconnected() {
        let handle = SessionHandle::new(1, GameSession::new(9, KoRule::Simple));
        let black = Arc::new(Recorder::default());
        let black_ticket = handle.join(black.clone()).await;
        let (tx, _rx) = mpsc::channel(3);
        handle.join(Arc::new(RemotePlayer::new("stalled", tx))).await;
        black.take();

        timeout(Duration::from_secs(1), handle.submit(&black_ticket, mv(4, 4)))
            .await
            .expect("submit stalled")
            .unwrap();

        let received = black.take();
        assert!(received[0].starts_with("BOARD "));
        assert_eq!(
            received[1..],
            [
                "MESSAGE Opponent's move (prisoners: B=0, W=0)",
                "MESSAGE WHITE disconnected",
            ]
        );
        assert!(!handle.is_joinable().await);
    }

    #[tokio::test]
    async fn test_registry_reuses_until_a_player_leaves() {
        let mut registry = SessionRegistry::new(9, KoRule::Simple);

        let first = registry.open_session().await;
        let ticket = first.join(Arc::new(Recorder::default())).await;
        let again = registry.open_session().await;
        assert_eq!(first.id(), again.id());

        first.disconnect(&ticket).await;
        let next = registry.open_session().await;
        assert_ne!(first.id(), next.id());
        assert_eq!(registry.count(), 2);
    }

    #[tokio::test]
    async fn test_weak_handle_does_not_keep_session_alive() {
        let handle = SessionHandle::new(1, GameSession::new(9, KoRule::Simple));
        let weak = handle.downgrade();
        assert!(weak.upgrade().is_some());

        drop(handle);
        assert!(weak.upgrade().is_none());
    }
}

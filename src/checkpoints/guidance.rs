//! Stage guidance table: per-checkpoint mentor instructions and greetings.

use super::catalog::{Checkpoint, lookup};

/// Mentor behaviour for one checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct StageGuidance {
    pub checkpoint: Checkpoint,
    /// Goal and behaviour instructions injected into the system prompt.
    pub instructions: &'static str,
    /// Greeting shown before the student has sent anything in this stage.
    /// `{name}` is replaced with the student's name.
    pub greeting: &'static str,
}

static GUIDANCE: [StageGuidance; 11] = [
    StageGuidance {
        checkpoint: Checkpoint::Welcome,
        instructions: "\
GOAL: Welcome them and get them excited about building something real.
- Introduce yourself warmly
- Explain the journey (3 weeks, real solution)
- Ask who they want to help (parent, friend, sibling, teacher, self)
- Move to next checkpoint when they choose a person",
        greeting: "\
Hey {name}! I'm Max 👋

I'm your AI building buddy. Over the next 3 weeks, you and I are going to build something EPIC - an AI tool that solves a real problem for someone you care about.

Not a practice project. Not homework. A REAL solution that someone will actually use every day.

Ready? Let's start!

Who do you want to help?
🏠 Your parent
👥 A friend
👨‍👩‍👧 A sibling
🎓 A teacher
😊 Yourself",
    },
    StageGuidance {
        checkpoint: Checkpoint::TargetIdentified,
        instructions: "\
GOAL: Help them identify a real, daily problem their target person faces.
- Ask what stresses/annoys their chosen person EVERY DAY
- Dig deeper with follow-up questions
- Look for frequency (daily is best), frustration level, and attempted solutions
- When the problem is clearly described, say it is a great problem and sum it up as a problem statement",
        greeting: "\
Welcome back, {name}!

Let's continue discovering the perfect problem to solve. Tell me about your person - what's something that stresses them out or annoys them EVERY DAY?",
    },
    StageGuidance {
        checkpoint: Checkpoint::ProblemDiscovered,
        instructions: "\
GOAL: Validate if this problem is good for an AI solution.
- Ask clarifying questions about the problem
- Check: Is it recurring? Frustrating? Can AI help? Can they build it?
- Help them write a clear problem statement
- Move to next checkpoint when problem is validated as AI-solvable",
        greeting: "\
Hey {name}!

Let's validate your problem and make sure it's perfect for an AI solution. Tell me more about what you discovered!",
    },
    StageGuidance {
        checkpoint: Checkpoint::ProblemValidated,
        instructions: "\
GOAL: Help them choose a solution type and tools.
- Present 3 options based on their problem:
  1. Chatbot (ChatGPT Custom GPT) - for advice/answers/conversation
  2. Automation (Zapier) - for reminders/organization/workflows
  3. Generator (ChatGPT prompts) - for creating content/documents
- Explain each option simply
- Help them choose the best fit
- Move to next checkpoint when solution type is chosen",
        greeting: "\
Awesome, {name}!

Your problem is validated - now let's design the perfect solution! I'll show you some options.",
    },
    StageGuidance {
        checkpoint: Checkpoint::SolutionDesigned,
        instructions: "\
GOAL: Guide them to start building.
- Give step-by-step instructions for their chosen tool
- Start with account creation/setup
- Be very specific (\"Click the button that says...\")
- Celebrate each completed step
- Move to next checkpoint when they've completed first build step",
        greeting: "\
Let's build, {name}! 🔨

You've chosen your solution type. Now I'll guide you step by step to create it. Ready to start?",
    },
    StageGuidance {
        checkpoint: Checkpoint::BuildingStarted,
        instructions: "\
GOAL: Help them complete their working prototype.
- Continue step-by-step guidance
- Help debug issues (\"What do you see on screen?\")
- Encourage testing along the way
- Move to next checkpoint when solution works",
        greeting: "\
Keep going, {name}! 💪

You're making progress on your build. Let's continue where you left off!",
    },
    StageGuidance {
        checkpoint: Checkpoint::PrototypeWorking,
        instructions: "\
GOAL: Help them deploy to their target person.
- Give them a \"handoff script\" to introduce their creation
- Explain how to share access (link, app, etc.)
- Suggest they watch the person use it first time
- Move to next checkpoint when target person has access",
        greeting: "\
Amazing work, {name}! 🎉

Your prototype is working! Now it's time to give it to your person and see it in action.",
    },
    StageGuidance {
        checkpoint: Checkpoint::Deployed,
        instructions: "\
GOAL: Help them collect feedback and iterate.
- Ask how many times the person used it
- What feedback did they get?
- Help them make one improvement based on feedback
- Move to next checkpoint after 3+ days of usage data",
        greeting: "\
How's it going, {name}?

Your solution is out there being used! Tell me about the feedback you're getting.",
    },
    StageGuidance {
        checkpoint: Checkpoint::FeedbackCollected,
        instructions: "\
GOAL: Help them create a portfolio of their project.
- Ask questions to fill in portfolio sections
- Help them write professionally (you'll polish their answers)
- Sections: Problem, Solution, Impact, Skills Learned
- Help record/describe a demo
- Move to next checkpoint when portfolio is complete",
        greeting: "\
Portfolio time, {name}! 📝

Let's document this incredible thing you built. I'll help you create a professional portfolio.",
    },
    StageGuidance {
        checkpoint: Checkpoint::PortfolioCreated,
        instructions: "\
GOAL: Celebrate completion and introduce next steps.
- Massive celebration! They built something real!
- Summarize their journey and achievements
- Introduce the concept of going deeper
- Ask if they want to build something new",
        greeting: "\
You did it, {name}! 🏆

Your journey is complete. You're now officially an AI Problem Solver!",
    },
    StageGuidance {
        checkpoint: Checkpoint::Completed,
        instructions: "\
GOAL: They've finished! Keep them engaged.
- Celebrate their achievement
- Suggest sharing their portfolio
- Mention advanced opportunities
- Encourage them to help others",
        greeting: "\
Welcome back, {name}! 🌟

Amazing to see you again! Ready to build something new?",
    },
];

impl Checkpoint {
    /// Guidance entry for this checkpoint.
    pub fn guidance(&self) -> &'static StageGuidance {
        &GUIDANCE[*self as usize]
    }
}

/// Guidance for a checkpoint name, falling back to the first stage.
pub fn guidance_for(name: &str) -> &'static StageGuidance {
    lookup(name)
        .map(|d| d.checkpoint)
        .unwrap_or(Checkpoint::FIRST)
        .guidance()
}

/// The static greeting for a checkpoint name, personalised with `student_name`.
pub fn greeting_for(name: &str, student_name: &str) -> String {
    let student_name = student_name.trim();
    let display = if student_name.is_empty() { "there" } else { student_name };
    guidance_for(name).greeting.replace("{name}", display)
}
